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

use serde::{Deserialize, Serialize};

use crate::plan::JoinType;

/// How a join result is hash-partitioned before it is written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    /// Ids of the partition-key columns in the partitioned data.
    pub key_column_ids: Vec<usize>,
    pub num_partitions: usize,
}

/// The join a broadcast join worker performs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInfo {
    pub join_type: JoinType,
    pub small_column_alias: Vec<String>,
    pub large_column_alias: Vec<String>,
    pub small_projection: Vec<bool>,
    pub large_projection: Vec<bool>,
    /// Whether the worker hash-partitions its result for the parent join.
    pub post_partition: bool,
    pub post_partition_info: Option<PartitionInfo>,
}

/// The join a partitioned join worker performs on its hash buckets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedJoinInfo {
    pub join_type: JoinType,
    pub small_column_alias: Vec<String>,
    pub large_column_alias: Vec<String>,
    pub small_projection: Vec<bool>,
    pub large_projection: Vec<bool>,
    pub num_partitions: usize,
    /// The hash buckets this worker is responsible for.
    pub hash_values: Vec<usize>,
    pub post_partition: bool,
    pub post_partition_info: Option<PartitionInfo>,
}

/// One link of a chain join: how the accumulated chain result joins the next
/// table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainJoinInfo {
    pub join_type: JoinType,
    pub small_column_alias: Vec<String>,
    pub large_column_alias: Vec<String>,
    /// Ids of the columns the link's result is keyed on for the next join.
    pub key_column_ids: Vec<usize>,
    pub small_projection: Vec<bool>,
    pub large_projection: Vec<bool>,
    pub post_partition: bool,
    pub post_partition_info: Option<PartitionInfo>,
}
