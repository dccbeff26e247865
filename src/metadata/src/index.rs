// Copyright 2024 PixelsDB
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Split and projection indices, and the process-wide factory that caches
//! them per table.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::layout::{Column, Projections, SchemaTableName, Splits};

/// Target bytes one split should read, used by the cost-based index.
const SPLIT_TARGET_BYTES: u64 = 128 * 1024 * 1024;

/// The set of column names a plan reads from one table.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnSet(BTreeSet<String>);

impl ColumnSet {
    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Exact-match index over the split patterns pre-computed for a layout.
///
/// The widest pattern acts as the default for access patterns that were not
/// pre-computed.
#[derive(Debug)]
pub struct InvertedSplitsIndex {
    version: u64,
    patterns: HashMap<ColumnSet, usize>,
    default_split_size: usize,
    max_split_size: usize,
}

// `HashMap<ColumnSet, _>` needs `Hash` on the ordered set.
impl std::hash::Hash for ColumnSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for column in &self.0 {
            column.hash(state);
        }
    }
}

impl InvertedSplitsIndex {
    pub fn from_splits(version: u64, splits: &Splits) -> Self {
        let mut patterns = HashMap::new();
        let mut default_split_size = 1;
        let mut default_width = 0;
        let mut max_split_size = 1;
        for pattern in &splits.split_patterns {
            let columns = ColumnSet::new(pattern.accessed_columns.iter().cloned());
            max_split_size = max_split_size.max(pattern.num_row_group_in_split);
            if columns.len() >= default_width {
                default_width = columns.len();
                default_split_size = pattern.num_row_group_in_split;
            }
            patterns.insert(columns, pattern.num_row_group_in_split);
        }
        Self {
            version,
            patterns,
            default_split_size,
            max_split_size,
        }
    }

    pub fn search(&self, columns: &ColumnSet) -> usize {
        match self.patterns.get(columns) {
            Some(split_size) => *split_size,
            None => {
                tracing::debug!(
                    ?columns,
                    "no split pattern for access pattern, using the default"
                );
                self.default_split_size
            }
        }
    }
}

/// Split sizes derived from column statistics: one split reads roughly
/// [`SPLIT_TARGET_BYTES`] of the accessed columns.
#[derive(Debug)]
pub struct CostBasedSplitsIndex {
    version: u64,
    chunk_sizes: HashMap<String, u64>,
    max_split_size: usize,
}

impl CostBasedSplitsIndex {
    pub fn from_columns(version: u64, columns: &[Column], max_split_size: usize) -> Self {
        Self {
            version,
            chunk_sizes: columns
                .iter()
                .map(|c| (c.name.clone(), c.chunk_size))
                .collect(),
            max_split_size,
        }
    }

    pub fn search(&self, columns: &ColumnSet) -> usize {
        let bytes_per_row_group: u64 = columns
            .iter()
            .filter_map(|c| self.chunk_sizes.get(c))
            .sum();
        if bytes_per_row_group == 0 {
            return self.max_split_size;
        }
        ((SPLIT_TARGET_BYTES / bytes_per_row_group) as usize).clamp(1, self.max_split_size)
    }
}

#[derive(Debug)]
pub enum SplitsIndex {
    Inverted(InvertedSplitsIndex),
    CostBased(CostBasedSplitsIndex),
}

impl SplitsIndex {
    pub fn version(&self) -> u64 {
        match self {
            Self::Inverted(index) => index.version,
            Self::CostBased(index) => index.version,
        }
    }

    pub fn max_split_size(&self) -> usize {
        match self {
            Self::Inverted(index) => index.max_split_size,
            Self::CostBased(index) => index.max_split_size,
        }
    }

    /// The split size for an access pattern, bounded by the max split size.
    pub fn search(&self, columns: &ColumnSet) -> usize {
        match self {
            Self::Inverted(index) => index.search(columns),
            Self::CostBased(index) => index.search(columns),
        }
    }
}

/// Exact-match index from access patterns to projection file copies.
#[derive(Debug)]
pub struct InvertedProjectionsIndex {
    version: u64,
    patterns: HashMap<ColumnSet, String>,
}

impl InvertedProjectionsIndex {
    pub fn from_projections(version: u64, projections: &Projections) -> Self {
        Self {
            version,
            patterns: projections
                .projection_patterns
                .iter()
                .map(|p| {
                    (
                        ColumnSet::new(p.accessed_columns.iter().cloned()),
                        p.path.clone(),
                    )
                })
                .collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn search(&self, columns: &ColumnSet) -> Option<&str> {
        self.patterns.get(columns).map(String::as_str)
    }
}

/// Process-wide cache of split and projection indices, keyed by table.
///
/// Lookups are lock-free reads of the latest snapshot; the rebuild path is
/// serialized by a mutex and atomically replaces the snapshot, so readers may
/// observe a stale-but-valid index. Callers compare the cached index version
/// against the layout version and rebuild when stale.
#[derive(Default)]
pub struct IndexFactory {
    splits: ArcSwap<HashMap<SchemaTableName, Arc<SplitsIndex>>>,
    projections: ArcSwap<HashMap<SchemaTableName, Arc<InvertedProjectionsIndex>>>,
    rebuild_lock: Mutex<()>,
}

impl IndexFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn splits_index(&self, table: &SchemaTableName) -> Option<Arc<SplitsIndex>> {
        self.splits.load().get(table).cloned()
    }

    pub fn cache_splits_index(
        &self,
        table: &SchemaTableName,
        index: SplitsIndex,
    ) -> Arc<SplitsIndex> {
        let _guard = self.rebuild_lock.lock();
        let index = Arc::new(index);
        let mut snapshot = HashMap::clone(&self.splits.load());
        snapshot.insert(table.clone(), index.clone());
        self.splits.store(Arc::new(snapshot));
        index
    }

    pub fn projections_index(&self, table: &SchemaTableName) -> Option<Arc<InvertedProjectionsIndex>> {
        self.projections.load().get(table).cloned()
    }

    pub fn cache_projections_index(
        &self,
        table: &SchemaTableName,
        index: InvertedProjectionsIndex,
    ) -> Arc<InvertedProjectionsIndex> {
        let _guard = self.rebuild_lock.lock();
        let index = Arc::new(index);
        let mut snapshot = HashMap::clone(&self.projections.load());
        snapshot.insert(table.clone(), index.clone());
        self.projections.store(Arc::new(snapshot));
        index
    }
}
