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

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};

/// Scan-time predicate of a base table.
///
/// The filter stays structured inside the plan IR; it is serialized to JSON
/// only when a worker-input descriptor is built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableScanFilter {
    pub schema_name: String,
    pub table_name: String,
    pub predicate: Predicate,
}

impl TableScanFilter {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            predicate,
        }
    }

    /// A filter that accepts every row.
    pub fn none(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self::new(schema_name, table_name, Predicate::All)
    }

    pub fn is_trivial(&self) -> bool {
        matches!(self.predicate, Predicate::All)
    }

    /// The columns the predicate references, as a bitset over `num_columns`.
    /// Column ids are validated against the table width on construction.
    pub fn referenced_columns(&self, num_columns: usize) -> FixedBitSet {
        let mut ids = Vec::new();
        self.predicate.collect_column_ids(&mut ids);
        let mut columns = FixedBitSet::with_capacity(num_columns);
        for id in ids {
            if id < num_columns {
                columns.insert(id);
            }
        }
        columns
    }

    /// As [`Self::referenced_columns`], but returns `None` when the predicate
    /// references a column id outside `0..num_columns`.
    pub fn referenced_columns_checked(&self, num_columns: usize) -> Option<FixedBitSet> {
        let mut ids = Vec::new();
        self.predicate.collect_column_ids(&mut ids);
        if ids.iter().any(|id| *id >= num_columns) {
            return None;
        }
        let mut columns = FixedBitSet::with_capacity(num_columns);
        for id in ids {
            columns.insert(id);
        }
        Some(columns)
    }

    /// Serializes the filter for a worker-input descriptor.
    pub fn to_json(&self) -> String {
        // The filter tree holds only strings, numbers and sequences.
        serde_json::to_string(self).expect("filter serialization is infallible")
    }
}

/// A predicate tree referencing columns by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Predicate {
    /// Accepts every row.
    All,
    #[serde(rename_all = "camelCase")]
    And { operands: Vec<Predicate> },
    #[serde(rename_all = "camelCase")]
    Or { operands: Vec<Predicate> },
    #[serde(rename_all = "camelCase")]
    Compare {
        column_id: usize,
        op: CompareOp,
        value: Scalar,
    },
    #[serde(rename_all = "camelCase")]
    IsNull { column_id: usize },
}

impl Predicate {
    fn collect_column_ids(&self, ids: &mut Vec<usize>) {
        match self {
            Self::All => {}
            Self::And { operands } | Self::Or { operands } => {
                for operand in operands {
                    operand.collect_column_ids(ids);
                }
            }
            Self::Compare { column_id, .. } | Self::IsNull { column_id } => {
                ids.push(*column_id);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Long(i64),
    Double(f64),
    Varchar(String),
}
