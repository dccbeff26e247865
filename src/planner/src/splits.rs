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

//! Split sizing: turns a base table's layouts into the ordered list of input
//! splits its scan workers consume.

use std::sync::Arc;

use pixels_common::SplitsIndexType;
use pixels_metadata::index::{
    ColumnSet, CostBasedSplitsIndex, InvertedProjectionsIndex, InvertedSplitsIndex, SplitsIndex,
};
use pixels_metadata::{Layout, SchemaTableName, Splits};

use crate::error::{PlannerError, PlannerResult};
use crate::plan::physical::{InputInfo, InputSplit};
use crate::plan::Table;
use crate::Planner;

impl Planner {
    /// The input splits of a base table, concatenated over its layout
    /// versions in encountered order.
    ///
    /// Files on the ordered path each count as one row group and are grouped
    /// into splits of `split_size` files; files on the compact path are
    /// sliced into strides of `split_size` row groups.
    pub(crate) fn input_splits(&self, table: &Table) -> PlannerResult<Vec<InputSplit>> {
        let base = table.as_base().ok_or_else(|| {
            PlannerError::invalid_plan(format!(
                "input splits requested for non-base table {}",
                table.table_name()
            ))
        })?;
        let name = table.name();
        let columns = ColumnSet::new(base.column_names.iter().cloned());
        let layouts = self.metadata.get_layouts(&name)?;

        let mut splits = Vec::new();
        for layout in &layouts {
            let splits_doc = layout.decode_splits(&name)?;

            let split_size = if self.config.fixed_split_size > 0 {
                self.config.fixed_split_size
            } else {
                let index = self.splits_index(&name, layout, &splits_doc)?;
                let size = index.search(&columns).min(index.max_split_size());
                let size = self.scale_by_selectivity(table, size);
                size.min(index.max_split_size())
            };
            // A degenerate pattern must not stall the stride walk below.
            let split_size = split_size.max(1);

            let mut compact_path = layout.compact_path.clone();
            if self.config.projection_read_enabled {
                let index = self.projections_index(&name, layout)?;
                if let Some(path) = index.search(&columns) {
                    tracing::debug!(table = %name, path, "reading a projection instead of the compact path");
                    compact_path = path.to_owned();
                }
            }

            if !layout.ordered_path.is_empty() {
                let mut files = self.storage.list_paths(&layout.ordered_path)?;
                files.sort_unstable();
                for chunk in files.chunks(split_size) {
                    splits.push(InputSplit::new(
                        chunk.iter().map(|f| InputInfo::new(f.clone(), 0, 1)).collect(),
                    ));
                }
            }

            if !compact_path.is_empty() {
                let mut files = self.storage.list_paths(&compact_path)?;
                files.sort_unstable();
                for file in &files {
                    let mut start = 0;
                    while start < splits_doc.num_row_group_in_block {
                        splits.push(InputSplit::single(InputInfo::new(
                            file.clone(),
                            start as i32,
                            split_size as i32,
                        )));
                        start += split_size;
                    }
                }
            }
        }
        Ok(splits)
    }

    /// A table filtered down to few rows can afford bigger splits.
    fn scale_by_selectivity(&self, table: &Table, split_size: usize) -> usize {
        let selectivity = self.advisor.table_selectivity(table);
        if selectivity < 0.0 {
            return split_size;
        }
        if selectivity < 0.25 {
            split_size * 4
        } else if selectivity < 0.5 {
            split_size * 2
        } else {
            split_size
        }
    }

    /// The splits index of a table, rebuilt when absent or older than the
    /// layout.
    fn splits_index(
        &self,
        name: &SchemaTableName,
        layout: &Layout,
        splits_doc: &Splits,
    ) -> PlannerResult<Arc<SplitsIndex>> {
        if let Some(index) = self.indexes.splits_index(name) {
            if index.version() >= layout.version {
                return Ok(index);
            }
        }
        tracing::debug!(table = %name, version = layout.version, "building splits index");
        let index = match self.config.splits_index_type {
            SplitsIndexType::Inverted => {
                SplitsIndex::Inverted(InvertedSplitsIndex::from_splits(layout.version, splits_doc))
            }
            SplitsIndexType::CostBased => {
                let columns = self.metadata.get_columns(name)?;
                let max_split_size = splits_doc
                    .split_patterns
                    .iter()
                    .map(|p| p.num_row_group_in_split)
                    .max()
                    .unwrap_or(1);
                SplitsIndex::CostBased(CostBasedSplitsIndex::from_columns(
                    layout.version,
                    &columns,
                    max_split_size,
                ))
            }
        };
        Ok(self.indexes.cache_splits_index(name, index))
    }

    /// The projections index of a table, rebuilt when absent or older than
    /// the layout.
    fn projections_index(
        &self,
        name: &SchemaTableName,
        layout: &Layout,
    ) -> PlannerResult<Arc<InvertedProjectionsIndex>> {
        if let Some(index) = self.indexes.projections_index(name) {
            if index.version() >= layout.version {
                return Ok(index);
            }
        }
        tracing::debug!(table = %name, version = layout.version, "building projections index");
        let projections = layout.decode_projections(name)?;
        let index = InvertedProjectionsIndex::from_projections(layout.version, &projections);
        Ok(self.indexes.cache_projections_index(name, index))
    }
}
