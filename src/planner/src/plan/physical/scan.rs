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

use super::aggregation::PartialAggregationInfo;
use super::io::OutputInfo;
use super::table_info::ScanTableInfo;

/// The input of one scan worker, optionally carrying a partial-aggregation
/// spec applied to the scanned rows before they are written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInput {
    pub query_id: u64,
    pub table_info: ScanTableInfo,
    /// Which of the read columns survive into the output.
    pub scan_projection: Vec<bool>,
    pub partial_aggregation_present: bool,
    pub partial_aggregation_info: Option<PartialAggregationInfo>,
    pub output: OutputInfo,
}
