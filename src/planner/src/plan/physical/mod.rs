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

//! Worker-input descriptors: the serializable records submitted to the
//! serverless worker runtime. Field names in serialized form are part of the
//! wire contract and must not change.

mod aggregation;
mod io;
mod join;
mod join_info;
mod partition;
mod scan;
mod table_info;

pub use aggregation::{AggregationInfo, AggregationInput, PartialAggregationInfo};
pub use io::{InputInfo, InputSplit, MultiOutputInfo, OutputInfo};
pub use join::{
    BroadcastChainJoinInput, BroadcastJoinInput, IncompleteChainJoin, JoinInput,
    PartitionedChainJoinInput, PartitionedJoinInput,
};
pub use join_info::{ChainJoinInfo, JoinInfo, PartitionInfo, PartitionedJoinInfo};
pub use partition::PartitionInput;
pub use scan::ScanInput;
pub use table_info::{AggregatedTableInfo, BroadcastTableInfo, PartitionedTableInfo, ScanTableInfo};
