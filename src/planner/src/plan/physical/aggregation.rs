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

use super::io::OutputInfo;
use super::table_info::AggregatedTableInfo;
use crate::plan::FunctionType;

/// A partial aggregation a scan or join worker folds its rows through before
/// writing its output. Column ids refer to the worker's output columns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialAggregationInfo {
    pub group_key_column_alias: Vec<String>,
    pub group_key_column_ids: Vec<usize>,
    pub aggregate_column_ids: Vec<usize>,
    pub result_column_alias: Vec<String>,
    pub result_column_types: Vec<String>,
    pub function_types: Vec<FunctionType>,
}

/// The aggregation an aggregation worker performs over partial-aggregation
/// files. Column ids refer to the partial files' columns, where the group
/// keys come first, followed by the partial results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationInfo {
    pub group_key_column_alias: Vec<String>,
    /// Which group-key columns survive into this stage's output.
    pub group_key_column_projection: Vec<bool>,
    pub group_key_column_ids: Vec<usize>,
    pub aggregate_column_ids: Vec<usize>,
    pub result_column_alias: Vec<String>,
    pub result_column_types: Vec<String>,
    pub function_types: Vec<FunctionType>,
}

/// The input of one aggregation worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationInput {
    pub query_id: u64,
    pub aggregated_table_info: AggregatedTableInfo,
    pub aggregation_info: AggregationInfo,
    pub output: OutputInfo,
}
