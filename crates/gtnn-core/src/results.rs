// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Per-query lists of data indices that met the similarity threshold.
///
/// Lists keep insertion order. Search results are ordered by visiting order
/// and ground truth is ascending; call [`HitLists::sorted`] before comparing
/// the two element by element.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HitLists {
    per_query: Vec<Vec<usize>>,
}

impl HitLists {
    /// Creates `nq` empty lists.
    pub fn with_queries(nq: usize) -> Self {
        Self {
            per_query: vec![Vec::new(); nq],
        }
    }

    pub fn from_lists(per_query: Vec<Vec<usize>>) -> Self {
        Self { per_query }
    }

    /// Number of queries covered.
    pub fn len(&self) -> usize {
        self.per_query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_query.is_empty()
    }

    pub fn get(&self, query: usize) -> Option<&[usize]> {
        self.per_query.get(query).map(Vec::as_slice)
    }

    /// Records `data_index` as a hit for `query`.
    ///
    /// Panics when `query` is outside the covered range.
    pub fn push(&mut self, query: usize, data_index: usize) {
        self.per_query[query].push(data_index);
    }

    /// Appends the lists of `other` after the lists already held.
    pub fn append(&mut self, mut other: HitLists) {
        self.per_query.append(&mut other.per_query);
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[usize]> + '_ {
        self.per_query.iter().map(Vec::as_slice)
    }

    pub fn total_hits(&self) -> usize {
        self.per_query.iter().map(Vec::len).sum()
    }

    /// Returns a copy with every list sorted ascending.
    pub fn sorted(&self) -> Self {
        let mut per_query = self.per_query.clone();
        for list in &mut per_query {
            list.sort_unstable();
        }
        Self { per_query }
    }

    pub fn as_lists(&self) -> &[Vec<usize>] {
        &self.per_query
    }

    pub fn into_lists(self) -> Vec<Vec<usize>> {
        self.per_query
    }
}
