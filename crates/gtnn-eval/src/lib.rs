// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Precision and recall of predicted hit lists against ground truth.

use gtnn_core::{GtError, HitLists};

/// Precision/recall for one query.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct QueryScore {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub precision: f64,
    pub recall: f64,
}

/// Per-query scores plus their arithmetic means and micro totals.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationSummary {
    pub per_query: Vec<QueryScore>,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationSummary {
    pub fn queries(&self) -> usize {
        self.per_query.len()
    }

    /// True when every query was recovered with no false positive and no
    /// false negative.
    pub fn is_exact(&self) -> bool {
        self.false_positives == 0 && self.false_negatives == 0
    }
}

/// Scores one query. Both inputs are treated as sets; order and duplicates
/// are ignored.
///
/// An empty prediction has precision `1.0` and an empty truth has recall
/// `1.0`, so a query with nothing to find and nothing found scores perfectly.
pub fn precision_recall(predicted: &[usize], truth: &[usize]) -> QueryScore {
    let predicted = sorted_unique(predicted);
    let truth = sorted_unique(truth);

    let true_positives = count_intersection(&predicted, &truth);
    let false_positives = predicted.len() - true_positives;
    let false_negatives = truth.len() - true_positives;

    let precision = if predicted.is_empty() {
        1.0
    } else {
        true_positives as f64 / predicted.len() as f64
    };
    let recall = if truth.is_empty() {
        1.0
    } else {
        true_positives as f64 / truth.len() as f64
    };

    QueryScore {
        true_positives,
        false_positives,
        false_negatives,
        precision,
        recall,
    }
}

/// Scores every query and averages precision and recall over queries.
///
/// Errors when the two sides cover a different number of queries or when
/// there are no queries at all.
pub fn evaluate(predicted: &HitLists, truth: &HitLists) -> Result<EvaluationSummary, GtError> {
    if predicted.len() != truth.len() {
        return Err(GtError::invalid_input(format!(
            "predicted and truth must cover the same queries; got {} and {}",
            predicted.len(),
            truth.len()
        )));
    }
    if predicted.is_empty() {
        return Err(GtError::invalid_input(
            "evaluation requires at least one query; got 0",
        ));
    }

    let per_query = predicted
        .iter()
        .zip(truth.iter())
        .map(|(found, expected)| precision_recall(found, expected))
        .collect::<Vec<_>>();

    let count = per_query.len() as f64;
    let mean_precision = per_query.iter().map(|score| score.precision).sum::<f64>() / count;
    let mean_recall = per_query.iter().map(|score| score.recall).sum::<f64>() / count;
    let true_positives = per_query.iter().map(|score| score.true_positives).sum();
    let false_positives = per_query.iter().map(|score| score.false_positives).sum();
    let false_negatives = per_query.iter().map(|score| score.false_negatives).sum();

    Ok(EvaluationSummary {
        per_query,
        mean_precision,
        mean_recall,
        true_positives,
        false_positives,
        false_negatives,
    })
}

fn sorted_unique(values: &[usize]) -> Vec<usize> {
    let mut out = values.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}

fn count_intersection(left: &[usize], right: &[usize]) -> usize {
    let mut i = 0usize;
    let mut j = 0usize;
    let mut count = 0usize;
    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}
