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

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use super::aggregation::PartialAggregationInfo;
use super::io::MultiOutputInfo;
use super::join_info::{ChainJoinInfo, JoinInfo, PartitionedJoinInfo};
use super::table_info::{BroadcastTableInfo, PartitionedTableInfo};

/// The input of one broadcast join worker: build the small table in memory,
/// probe it with a shard of the large table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastJoinInput {
    pub query_id: u64,
    pub small_table: BroadcastTableInfo,
    pub large_table: BroadcastTableInfo,
    pub join_info: JoinInfo,
    pub partial_aggregation_present: bool,
    pub partial_aggregation_info: Option<PartialAggregationInfo>,
    pub output: MultiOutputInfo,
}

/// The input of one chain join worker: build every chain table in memory,
/// fold them left to right through `chain_join_infos`, then probe the result
/// with a shard of the large table.
///
/// `chain_join_infos` has exactly one entry per chain table: the first
/// `len - 1` entries describe the chain links, the last one describes the
/// final join against the large table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastChainJoinInput {
    pub query_id: u64,
    pub chain_tables: Vec<BroadcastTableInfo>,
    pub chain_join_infos: Vec<ChainJoinInfo>,
    pub large_table: BroadcastTableInfo,
    pub join_info: JoinInfo,
    pub partial_aggregation_present: bool,
    pub partial_aggregation_info: Option<PartialAggregationInfo>,
    pub output: MultiOutputInfo,
}

/// The input of one partitioned join worker: join the hash buckets it is
/// responsible for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedJoinInput {
    pub query_id: u64,
    pub small_table: PartitionedTableInfo,
    pub large_table: PartitionedTableInfo,
    pub join_info: PartitionedJoinInfo,
    pub partial_aggregation_present: bool,
    pub partial_aggregation_info: Option<PartialAggregationInfo>,
    pub output: MultiOutputInfo,
}

/// A partitioned join input augmented with chain tables that are broadcast
/// into the worker and joined before the final partitioned probe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionedChainJoinInput {
    pub query_id: u64,
    pub chain_tables: Vec<BroadcastTableInfo>,
    pub chain_join_infos: Vec<ChainJoinInfo>,
    pub small_table: PartitionedTableInfo,
    pub large_table: PartitionedTableInfo,
    pub join_info: PartitionedJoinInfo,
    pub partial_aggregation_present: bool,
    pub partial_aggregation_info: Option<PartialAggregationInfo>,
    pub output: MultiOutputInfo,
}

/// A submittable join worker input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, EnumAsInner)]
#[serde(rename_all = "camelCase")]
pub enum JoinInput {
    Broadcast(BroadcastJoinInput),
    BroadcastChain(BroadcastChainJoinInput),
    Partitioned(PartitionedJoinInput),
    PartitionedChain(PartitionedChainJoinInput),
}

impl JoinInput {
    pub fn output(&self) -> &MultiOutputInfo {
        match self {
            Self::Broadcast(input) => &input.output,
            Self::BroadcastChain(input) => &input.output,
            Self::Partitioned(input) => &input.output,
            Self::PartitionedChain(input) => &input.output,
        }
    }

    pub fn set_output(&mut self, output: MultiOutputInfo) {
        match self {
            Self::Broadcast(input) => input.output = output,
            Self::BroadcastChain(input) => input.output = output,
            Self::Partitioned(input) => input.output = output,
            Self::PartitionedChain(input) => input.output = output,
        }
    }

    /// Makes the worker fold its join result through a partial aggregation
    /// before writing it.
    pub fn attach_partial_aggregation(&mut self, info: PartialAggregationInfo) {
        let (present, slot) = match self {
            Self::Broadcast(input) => (
                &mut input.partial_aggregation_present,
                &mut input.partial_aggregation_info,
            ),
            Self::BroadcastChain(input) => (
                &mut input.partial_aggregation_present,
                &mut input.partial_aggregation_info,
            ),
            Self::Partitioned(input) => (
                &mut input.partial_aggregation_present,
                &mut input.partial_aggregation_info,
            ),
            Self::PartitionedChain(input) => (
                &mut input.partial_aggregation_present,
                &mut input.partial_aggregation_info,
            ),
        };
        *present = true;
        *slot = Some(info);
    }
}

/// A broadcast chain join that has accumulated its chain tables but is not
/// yet bound to a large table.
///
/// This is the only transient state the compiler threads between recursion
/// levels: it may appear as the sole pending input of a join operator, and
/// completing it is a total function that produces one
/// [`BroadcastChainJoinInput`] per large-side worker batch.
#[derive(Clone, Debug, PartialEq)]
pub struct IncompleteChainJoin {
    chain_tables: Vec<BroadcastTableInfo>,
    chain_join_infos: Vec<ChainJoinInfo>,
}

impl IncompleteChainJoin {
    /// Starts a chain from the two sides of its first join.
    pub fn new(
        first: BroadcastTableInfo,
        second: BroadcastTableInfo,
        join_info: ChainJoinInfo,
    ) -> Self {
        Self {
            chain_tables: vec![first, second],
            chain_join_infos: vec![join_info],
        }
    }

    /// Appends one more table to the chain.
    pub fn extend(&mut self, table: BroadcastTableInfo, join_info: ChainJoinInfo) {
        self.chain_tables.push(table);
        self.chain_join_infos.push(join_info);
    }

    pub fn chain_tables(&self) -> &[BroadcastTableInfo] {
        &self.chain_tables
    }

    /// Binds the chain to a shard of the large table, yielding a complete,
    /// submittable chain join input. `final_join_info` describes the join of
    /// the chain result against the large table and becomes the last chain
    /// link, keeping one link per chain table.
    pub fn complete(
        &self,
        query_id: u64,
        large_table: BroadcastTableInfo,
        final_join_info: ChainJoinInfo,
        join_info: JoinInfo,
        output: MultiOutputInfo,
    ) -> BroadcastChainJoinInput {
        let mut chain_join_infos = self.chain_join_infos.clone();
        chain_join_infos.push(final_join_info);
        BroadcastChainJoinInput {
            query_id,
            chain_tables: self.chain_tables.clone(),
            chain_join_infos,
            large_table,
            join_info,
            partial_aggregation_present: false,
            partial_aggregation_info: None,
            output,
        }
    }

    /// Dissolves the chain into its parts, for fusion into a partitioned
    /// join pipeline.
    pub fn into_parts(self) -> (Vec<BroadcastTableInfo>, Vec<ChainJoinInfo>) {
        (self.chain_tables, self.chain_join_infos)
    }
}
