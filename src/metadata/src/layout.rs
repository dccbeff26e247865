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

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};

/// The qualified name of a table, used as the cache key of the index factory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTableName {
    pub schema_name: String,
    pub table_name: String,
}

impl SchemaTableName {
    pub fn new(schema_name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
        }
    }
}

impl Display for SchemaTableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema_name, self.table_name)
    }
}

/// One physical layout version of a table.
///
/// The `order`, `splits` and `projections` fields hold the documents exactly
/// as the catalog serializes them; they are decoded on demand and a decoding
/// failure surfaces as [`MetadataError::Malformed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    pub version: u64,
    /// Directory of append-only single-row-group files.
    pub ordered_path: String,
    /// Directory of compacted multi-row-group files.
    pub compact_path: String,
    pub order: String,
    pub splits: String,
    pub projections: String,
}

impl Layout {
    pub fn decode_order(&self, table: &SchemaTableName) -> MetadataResult<Order> {
        decode(&self.order, table, "order")
    }

    pub fn decode_splits(&self, table: &SchemaTableName) -> MetadataResult<Splits> {
        decode(&self.splits, table, "splits")
    }

    pub fn decode_projections(&self, table: &SchemaTableName) -> MetadataResult<Projections> {
        decode(&self.projections, table, "projections")
    }
}

fn decode<'a, T: Deserialize<'a>>(
    json: &'a str,
    table: &SchemaTableName,
    document: &'static str,
) -> MetadataResult<T> {
    serde_json::from_str(json).map_err(|source| MetadataError::Malformed {
        table: table.to_string(),
        document,
        source,
    })
}

/// The column order of a layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub column_order: Vec<String>,
}

/// The split configuration of a layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Splits {
    /// Row groups a compacted file holds.
    pub num_row_group_in_block: usize,
    pub split_patterns: Vec<SplitPattern>,
}

/// A pre-computed split size for one column access pattern.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPattern {
    pub accessed_columns: Vec<String>,
    pub num_row_group_in_split: usize,
}

/// The projection (column-subset file copies) configuration of a layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projections {
    pub projection_patterns: Vec<ProjectionPattern>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPattern {
    pub accessed_columns: Vec<String>,
    pub path: String,
}

/// Column statistics used by the cost-based splits index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    /// Average bytes one row-group chunk of this column occupies.
    pub chunk_size: u64,
}
