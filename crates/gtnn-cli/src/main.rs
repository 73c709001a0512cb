// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use gtnn_cli::{PipelineSpec, build_index_file, evaluate_files, run_pipeline};
use gtnn_core::GtError;
use gtnn_index::SummationMode;
use gtnn_io::LoadOptions;
use serde::Serialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

struct Cli {
    command: Command,
}

enum Command {
    Run(RunArgs),
    Search(SearchArgs),
    Index(IndexArgs),
    Eval(EvalArgs),
}

#[derive(Debug)]
struct RunArgs {
    pipeline: PathBuf,
    output: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct SearchArgs {
    spec: PipelineSpec,
    output: Option<PathBuf>,
}

#[derive(Debug)]
struct IndexArgs {
    data: PathBuf,
    n: usize,
    dim: usize,
    transpose: bool,
    summation: SummationMode,
    index_path: PathBuf,
    output: Option<PathBuf>,
}

impl Default for IndexArgs {
    fn default() -> Self {
        Self {
            data: PathBuf::new(),
            n: 0,
            dim: 0,
            transpose: false,
            summation: SummationMode::Plain,
            index_path: PathBuf::new(),
            output: None,
        }
    }
}

#[derive(Debug, Default)]
struct EvalArgs {
    predictions: PathBuf,
    ground_truth: PathBuf,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Gt(GtError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Gt(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gt(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gt(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<GtError> for CliError {
    fn from(value: GtError) -> Self {
        Self::Gt(value)
    }
}

#[derive(Serialize)]
struct CommandOutput<'a, T: Serialize> {
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pipeline: Option<&'a PipelineSpec>,
    result: T,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        tracing::debug!(code = err.code(), "command failed");
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), CliError> {
    let Some(cli) = parse_cli(env::args().skip(1).collect())? else {
        return Ok(());
    };

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Search(args) => handle_search(args),
        Command::Index(args) => handle_index(args),
        Command::Eval(args) => handle_eval(args),
    }
}

fn parse_cli(args: Vec<String>) -> Result<Option<Cli>, CliError> {
    if args.is_empty() {
        print_root_help();
        return Ok(None);
    }

    if matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        print_version();
        return Ok(None);
    }

    let command = match command_name {
        "run" => Command::Run(parse_run_args(rest)?),
        "search" => Command::Search(parse_search_args(rest)?),
        "index" => Command::Index(parse_index_args(rest)?),
        "eval" => Command::Eval(parse_eval_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: run, search, index, eval"
            )));
        }
    };

    Ok(Some(Cli { command }))
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut pipeline = PathBuf::new();
    let mut output: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--pipeline" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                pipeline = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown run option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if pipeline.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --pipeline <path>"));
    }

    Ok(RunArgs { pipeline, output })
}

fn parse_search_args(tokens: &[String]) -> Result<SearchArgs, CliError> {
    let mut args = SearchArgs::default();
    let spec = &mut args.spec;
    let mut rho: Option<f64> = None;

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--data" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.data_path = PathBuf::from(raw);
            }
            "--queries" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.query_path = PathBuf::from(raw);
            }
            "--dataset" => {
                spec.dataset = take_flag_value(flag, inline_value, tokens, &mut idx)?;
            }
            "--result-root" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.result_root = PathBuf::from(raw);
            }
            "--n" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.n = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--nq" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.nq = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--dim" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.dim = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--rho" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                rho = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            "--batch-size" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.search.batch_size = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--prune-slack" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.search.prune_slack = parse_f64_arg(raw.as_str(), flag)?;
            }
            "--load-index" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.load_index = Some(PathBuf::from(raw));
            }
            "--save-index" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                spec.save_index = Some(PathBuf::from(raw));
            }
            "--transpose-data" => {
                ensure_no_inline_value(flag, inline_value)?;
                spec.transpose_data = true;
            }
            "--transpose-queries" => {
                ensure_no_inline_value(flag, inline_value)?;
                spec.transpose_queries = true;
            }
            "--compensated" => {
                ensure_no_inline_value(flag, inline_value)?;
                spec.search.summation = SummationMode::Compensated;
            }
            "--parallel" => {
                ensure_no_inline_value(flag, inline_value)?;
                spec.search.parallel_batches = true;
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown search option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    for (missing, flag) in [
        (spec.data_path.as_os_str().is_empty(), "--data <path>"),
        (spec.query_path.as_os_str().is_empty(), "--queries <path>"),
        (spec.dataset.is_empty(), "--dataset <name>"),
    ] {
        if missing {
            return Err(CliError::invalid_input(format!("search requires {flag}")));
        }
    }
    spec.search.rho =
        rho.ok_or_else(|| CliError::invalid_input("search requires --rho <float>"))?;
    spec.validate()?;

    Ok(args)
}

fn parse_index_args(tokens: &[String]) -> Result<IndexArgs, CliError> {
    let mut args = IndexArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--data" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.data = PathBuf::from(raw);
            }
            "--n" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.n = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--dim" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.dim = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--transpose" => {
                ensure_no_inline_value(flag, inline_value)?;
                args.transpose = true;
            }
            "--compensated" => {
                ensure_no_inline_value(flag, inline_value)?;
                args.summation = SummationMode::Compensated;
            }
            "--index" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.index_path = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown index option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.data.as_os_str().is_empty() {
        return Err(CliError::invalid_input("index requires --data <path>"));
    }
    if args.index_path.as_os_str().is_empty() {
        return Err(CliError::invalid_input("index requires --index <path>"));
    }
    if args.n == 0 || args.dim == 0 {
        return Err(CliError::invalid_input(
            "index requires --n <usize> and --dim <usize>, both >= 1",
        ));
    }

    Ok(args)
}

fn parse_eval_args(tokens: &[String]) -> Result<EvalArgs, CliError> {
    let mut args = EvalArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--predictions" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.predictions = PathBuf::from(raw);
            }
            "--ground-truth" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.ground_truth = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown eval option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.predictions.as_os_str().is_empty() {
        return Err(CliError::invalid_input(
            "eval requires --predictions <path>",
        ));
    }
    if args.ground_truth.as_os_str().is_empty() {
        return Err(CliError::invalid_input(
            "eval requires --ground-truth <path>",
        ));
    }

    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<(), CliError> {
    if inline_value.is_some() {
        return Err(CliError::invalid_input(format!(
            "{flag} does not accept a value"
        )));
    }
    Ok(())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn print_version() {
    println!("gtnn {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "gtnn {}\n\nUSAGE:\n  gtnn <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  run      Execute a pipeline spec JSON\n  search   Run search, oracle, and evaluation from CLI flags\n  index    Build and save the prefix index of a data file\n  eval     Score saved results against saved ground truth\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nLogs go to stderr; set RUST_LOG to change verbosity.\nRun 'gtnn <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "run" => {
            println!(
                "USAGE:\n  gtnn run --pipeline <spec.json> [OPTIONS]\n\nOPTIONS:\n  --pipeline <path>                  Required pipeline JSON\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        "search" => {
            println!(
                "USAGE:\n  gtnn search --data <path> --queries <path> --dataset <name> --n <usize> --nq <usize> --dim <usize> --rho <float> [OPTIONS]\n\nOPTIONS:\n  --result-root <path>               Default: results\n  --batch-size <usize>               Default: 0 (all queries in one batch)\n  --prune-slack <float>              Default: 1e-9\n  --load-index <path>                Restore the data prefix index\n  --save-index <path>                Persist the data prefix index\n  --transpose-data\n  --transpose-queries\n  --compensated                      Kahan-compensated prefix sums\n  --parallel                         Run batches on the thread pool\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        "index" => {
            println!(
                "USAGE:\n  gtnn index --data <path> --n <usize> --dim <usize> --index <path> [OPTIONS]\n\nOPTIONS:\n  --transpose\n  --compensated                      Kahan-compensated prefix sums\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        "eval" => {
            println!(
                "USAGE:\n  gtnn eval --predictions <results.txt> --ground-truth <ground_truth.txt> [OPTIONS]\n\nOPTIONS:\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: run, search, index, eval"
        ))),
    }
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let pipeline = load_pipeline_spec(args.pipeline.as_path())?;
    let result = run_pipeline(&pipeline)?;

    write_json_output(
        &CommandOutput {
            command: "run",
            pipeline: Some(&pipeline),
            result,
        },
        args.output.as_deref(),
    )
}

fn handle_search(args: SearchArgs) -> Result<(), CliError> {
    let result = run_pipeline(&args.spec)?;

    write_json_output(
        &CommandOutput {
            command: "search",
            pipeline: Some(&args.spec),
            result,
        },
        args.output.as_deref(),
    )
}

fn handle_index(args: IndexArgs) -> Result<(), CliError> {
    let mut options = LoadOptions::new(args.n, args.dim).with_max_rows(args.n);
    if args.transpose {
        options = options.transposed();
    }
    let result = build_index_file(
        args.data.as_path(),
        &options,
        args.summation,
        args.index_path.as_path(),
    )?;

    write_json_output(
        &CommandOutput {
            command: "index",
            pipeline: None,
            result,
        },
        args.output.as_deref(),
    )
}

fn handle_eval(args: EvalArgs) -> Result<(), CliError> {
    let result = evaluate_files(args.predictions.as_path(), args.ground_truth.as_path())?;

    write_json_output(
        &CommandOutput {
            command: "eval",
            pipeline: None,
            result,
        },
        args.output.as_deref(),
    )
}

fn load_pipeline_spec(path: &Path) -> Result<PipelineSpec, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    parse_pipeline_spec_document(raw.as_str())
}

fn parse_pipeline_spec_document(raw: &str) -> Result<PipelineSpec, CliError> {
    let spec = serde_json::from_str::<PipelineSpec>(raw)
        .map_err(|source| CliError::json("invalid pipeline JSON", source))?;
    spec.validate()?;
    Ok(spec)
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
