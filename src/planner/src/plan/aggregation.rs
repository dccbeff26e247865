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

use crate::error::{PlannerError, PlannerResult};
use crate::plan::table::Table;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FunctionType {
    Sum,
    Min,
    Max,
    Count,
}

/// Where the final aggregation result lands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEndpoint {
    /// Folder for the final result file.
    pub path: String,
    pub storage: StorageInfo,
}

/// A grouped aggregation over an origin table.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub origin_table: Box<Table>,
    /// Ids of the group-key columns in the origin table.
    pub group_key_column_ids: Vec<usize>,
    pub group_key_column_alias: Vec<String>,
    /// Which group-key columns survive into the final result.
    pub group_key_column_projection: Vec<bool>,
    /// Ids of the aggregated columns in the origin table.
    pub aggregate_column_ids: Vec<usize>,
    pub result_column_alias: Vec<String>,
    pub result_column_types: Vec<String>,
    pub function_types: Vec<FunctionType>,
    pub output_endpoint: OutputEndpoint,
}

#[allow(clippy::too_many_arguments)]
impl Aggregation {
    pub fn new(
        origin_table: Table,
        group_key_column_ids: Vec<usize>,
        group_key_column_alias: Vec<String>,
        group_key_column_projection: Vec<bool>,
        aggregate_column_ids: Vec<usize>,
        result_column_alias: Vec<String>,
        result_column_types: Vec<String>,
        function_types: Vec<FunctionType>,
        output_endpoint: OutputEndpoint,
    ) -> PlannerResult<Self> {
        if group_key_column_ids.len() != group_key_column_alias.len()
            || group_key_column_ids.len() != group_key_column_projection.len()
        {
            return Err(PlannerError::invalid_plan(format!(
                "aggregation over {} has mismatched group-key columns",
                origin_table.table_name()
            )));
        }
        if aggregate_column_ids.len() != function_types.len()
            || aggregate_column_ids.len() != result_column_alias.len()
            || aggregate_column_ids.len() != result_column_types.len()
        {
            return Err(PlannerError::invalid_plan(format!(
                "aggregation over {} has mismatched aggregate columns",
                origin_table.table_name()
            )));
        }
        Ok(Self {
            origin_table: Box::new(origin_table),
            group_key_column_ids,
            group_key_column_alias,
            group_key_column_projection,
            aggregate_column_ids,
            result_column_alias,
            result_column_types,
            function_types,
            output_endpoint,
        })
    }
}
