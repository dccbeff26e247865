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

use pixels_common::StorageInfo;
use serde::{Deserialize, Serialize};

use super::io::InputSplit;

/// A table read by a scan or partition worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTableInfo {
    pub table_name: String,
    /// Whether the data is base table data rather than an intermediate
    /// result.
    pub base: bool,
    pub columns_to_read: Vec<String>,
    pub input_splits: Vec<InputSplit>,
    /// Serialized scan filter.
    pub filter: String,
    pub storage_info: StorageInfo,
}

/// One side of a broadcast(-chain) join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTableInfo {
    pub table_name: String,
    pub base: bool,
    pub columns_to_read: Vec<String>,
    pub input_splits: Vec<InputSplit>,
    /// Ids of the join-key columns within `columns_to_read`.
    pub key_column_ids: Vec<usize>,
    /// Serialized scan filter.
    pub filter: String,
    pub storage_info: StorageInfo,
}

/// One side of a partitioned join, already hash-partitioned on the join keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedTableInfo {
    pub table_name: String,
    pub base: bool,
    pub columns_to_read: Vec<String>,
    /// The partitioned files, one per upstream partition worker.
    pub input_files: Vec<String>,
    /// Ids of the join-key columns within `columns_to_read`.
    pub key_column_ids: Vec<usize>,
    /// Threads one join worker uses to read the partitioned files.
    pub parallelism: usize,
    pub storage_info: StorageInfo,
}

/// The partial-aggregation files read by an aggregation worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedTableInfo {
    pub table_name: String,
    pub base: bool,
    pub columns_to_read: Vec<String>,
    pub input_files: Vec<String>,
    pub parallelism: usize,
    pub storage_info: StorageInfo,
}
