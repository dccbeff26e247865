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
use super::join_info::PartitionInfo;
use super::table_info::ScanTableInfo;

/// The input of one partition worker: scan a slice of a table, evaluate its
/// filter, and hash-partition the projected columns into one partitioned
/// file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInput {
    pub query_id: u64,
    pub table_info: ScanTableInfo,
    /// Which of the read columns are written into the partitioned file.
    pub projection: Vec<bool>,
    pub partition_info: PartitionInfo,
    /// The partitioned file.
    pub output: OutputInfo,
}
