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

//! The recursive join compiler.
//!
//! Each call compiles one joined table into an operator, threading a parent
//! hint down the tree. The hint drives the two cross-level behaviors:
//! fusing consecutive broadcast joins into a chain join, and making a child
//! hash-partition its output for a partitioned parent.

use fixedbitset::FixedBitSet;
use itertools::Itertools;

use crate::error::{PlannerError, PlannerResult};
use crate::operator::{JoinInputs, Operator, PartitionedJoinOperator, SingleStageJoinOperator};
use crate::plan::physical::{
    BroadcastJoinInput, BroadcastTableInfo, ChainJoinInfo, IncompleteChainJoin, InputInfo,
    InputSplit, JoinInfo, JoinInput, MultiOutputInfo, OutputInfo, PartitionInfo, PartitionInput,
    PartitionedChainJoinInput, PartitionedJoinInfo, PartitionedJoinInput, PartitionedTableInfo,
    ScanTableInfo,
};
use crate::plan::{
    BaseTable, Join, JoinAlgorithm, JoinEndian, JoinedTable, Table, TableScanFilter,
};
use crate::Planner;

/// Broadcast fan-outs above this many workers are candidates for split
/// re-packing when their output feeds every parent worker.
const BROADCAST_REPACK_WORKER_THRESHOLD: usize = 32;

/// Which child of its parent the join being compiled is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JoinSide {
    Left,
    Right,
}

/// The parent hint threaded down the recursion. The compiler never stores a
/// back-pointer to the parent inside an operator; the hint is all a child
/// ever sees of it.
#[derive(Clone, Copy)]
pub(crate) struct ParentJoin<'a> {
    pub joined: &'a JoinedTable,
    pub side: JoinSide,
}

impl ParentJoin<'_> {
    fn join(&self) -> &Join {
        &self.joined.join
    }

    fn is_small_left_broadcast(&self) -> bool {
        let join = self.join();
        join.join_algo == JoinAlgorithm::Broadcast && join.join_endian == JoinEndian::SmallLeft
    }
}

impl Planner {
    pub(crate) fn compile_join(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
    ) -> PlannerResult<Operator> {
        match joined.join.join_algo {
            JoinAlgorithm::Broadcast => self.compile_broadcast_join(joined, parent),
            JoinAlgorithm::Partitioned => self.compile_partitioned_join(joined, parent),
            algo => Err(PlannerError::invalid_plan(format!(
                "join {} carries algorithm {algo:?}, which only arises from fusion \
                 and cannot appear in an input plan",
                joined.table_name
            ))),
        }
    }

    fn compile_broadcast_join(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        if join.is_multi_pipeline() {
            return self.compile_multi_pipeline_broadcast(joined, parent);
        }

        match &*join.left {
            Table::Base(_) => {
                // Two consecutive small-left broadcast joins start a chain.
                if let Some(p) = parent.filter(|p| p.is_small_left_broadcast()) {
                    return self.initiate_chain_join(joined, p);
                }
                self.plain_broadcast_join(joined, parent, None)
            }
            Table::Joined(left_joined) => {
                let hint = ParentJoin {
                    joined,
                    side: JoinSide::Left,
                };
                let child = self.compile_join(left_joined, Some(hint))?;
                match child {
                    Operator::SingleStageJoin(mut child_op)
                        if matches!(child_op.inputs, JoinInputs::PendingChain(_)) =>
                    {
                        // The child only stays pending when this join is a
                        // small-left broadcast.
                        debug_assert_eq!(join.join_endian, JoinEndian::SmallLeft);
                        if let Some(p) = parent.filter(|p| p.is_small_left_broadcast()) {
                            self.extend_chain_join(joined, p, &mut child_op)?;
                            return Ok(Operator::SingleStageJoin(child_op));
                        }
                        let JoinInputs::PendingChain(pending) = child_op.inputs else {
                            unreachable!("matched as pending above");
                        };
                        self.complete_chain_join(joined, parent, pending)
                    }
                    child => self.plain_broadcast_join(joined, parent, Some(child)),
                }
            }
            Table::Aggregated(_) => Err(PlannerError::invalid_plan(format!(
                "join {} reads an aggregated table, which must be the plan root",
                joined.table_name
            ))),
        }
    }

    /// Starts a chain from a broadcast join whose both sides are base tables,
    /// under a small-left broadcast parent. The pending chain carries no
    /// output; it is completed higher up the tree.
    fn initiate_chain_join(
        &self,
        joined: &JoinedTable,
        parent: ParentJoin<'_>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        let left = expect_base(&join.left)?;
        let right = expect_base(&join.right)?;
        let left_splits = self.input_splits(&join.left)?;
        let right_splits = self.input_splits(&join.right)?;

        let left_info =
            self.base_broadcast_info(left, left_splits, join.left_key_column_ids.clone());
        let right_info =
            self.base_broadcast_info(right, right_splits, join.right_key_column_ids.clone());

        // The chain is ordered small first; a large-left join flips.
        let (first, second, join_type, small_alias, large_alias, small_proj, large_proj) =
            match join.join_endian {
                JoinEndian::SmallLeft => (
                    left_info,
                    right_info,
                    join.join_type,
                    join.left_column_alias.clone(),
                    join.right_column_alias.clone(),
                    join.left_projection.clone(),
                    join.right_projection.clone(),
                ),
                JoinEndian::LargeLeft => (
                    right_info,
                    left_info,
                    join.join_type.flip(),
                    join.right_column_alias.clone(),
                    join.left_column_alias.clone(),
                    join.right_projection.clone(),
                    join.left_projection.clone(),
                ),
            };
        let link = ChainJoinInfo {
            join_type,
            small_column_alias: small_alias,
            large_column_alias: large_alias,
            // The chain result is next probed on the parent's left keys.
            key_column_ids: parent.join().left_key_column_ids.clone(),
            small_projection: small_proj,
            large_projection: large_proj,
            post_partition: false,
            post_partition_info: None,
        };

        Ok(Operator::SingleStageJoin(SingleStageJoinOperator {
            name: qualified_name(joined),
            join_algo: JoinAlgorithm::BroadcastChain,
            inputs: JoinInputs::PendingChain(IncompleteChainJoin::new(first, second, link)),
            small_child: None,
            large_child: None,
        }))
    }

    /// Appends this join's base right table to the child's pending chain.
    fn extend_chain_join(
        &self,
        joined: &JoinedTable,
        parent: ParentJoin<'_>,
        child: &mut SingleStageJoinOperator,
    ) -> PlannerResult<()> {
        let join = &joined.join;
        let right = expect_base(&join.right)?;
        let right_splits = self.input_splits(&join.right)?;
        let table =
            self.base_broadcast_info(right, right_splits, join.right_key_column_ids.clone());
        let link = ChainJoinInfo {
            join_type: join.join_type,
            small_column_alias: join.left_column_alias.clone(),
            large_column_alias: join.right_column_alias.clone(),
            // The chain result is next probed on the parent's left keys.
            key_column_ids: parent.join().left_key_column_ids.clone(),
            small_projection: join.left_projection.clone(),
            large_projection: join.right_projection.clone(),
            post_partition: false,
            post_partition_info: None,
        };
        let JoinInputs::PendingChain(pending) = &mut child.inputs else {
            return Err(PlannerError::invalid_plan(format!(
                "chain join of {} cannot be extended after completion",
                joined.table_name
            )));
        };
        pending.extend(table, link);
        Ok(())
    }

    /// Completes the child's pending chain against this join's base right
    /// table, one completed input per worker batch of the right side.
    fn complete_chain_join(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
        pending: IncompleteChainJoin,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        debug_assert_eq!(join.join_endian, JoinEndian::SmallLeft);
        let right = expect_base(&join.right)?;
        let right_splits = self.input_splits(&join.right)?;
        let right_splits =
            self.adjust_broadcast_input_splits(&join.left, &join.right, right_splits, parent);

        let (post_partition, post_partition_info) = self.post_partition(parent);
        let folder = self.table_folder(&joined.schema_name, &joined.table_name);

        let mut inputs = Vec::new();
        for (output_id, batch) in right_splits
            .chunks(self.config.intra_worker_parallelism)
            .enumerate()
        {
            let large_table = self.base_broadcast_info(
                right,
                batch.to_vec(),
                join.right_key_column_ids.clone(),
            );
            let final_link = ChainJoinInfo {
                join_type: join.join_type,
                small_column_alias: join.left_column_alias.clone(),
                large_column_alias: join.right_column_alias.clone(),
                key_column_ids: join.left_key_column_ids.clone(),
                small_projection: join.left_projection.clone(),
                large_projection: join.right_projection.clone(),
                post_partition,
                post_partition_info: post_partition_info.clone(),
            };
            let join_info = JoinInfo {
                join_type: join.join_type,
                small_column_alias: join.left_column_alias.clone(),
                large_column_alias: join.right_column_alias.clone(),
                small_projection: join.left_projection.clone(),
                large_projection: join.right_projection.clone(),
                post_partition,
                post_partition_info: post_partition_info.clone(),
            };
            let output = MultiOutputInfo {
                path: folder.clone(),
                storage_info: self.intermediate_storage(),
                encoding: true,
                file_names: vec![format!("{output_id}/join")],
            };
            inputs.push(JoinInput::BroadcastChain(pending.complete(
                self.query_id,
                large_table,
                final_link,
                join_info,
                output,
            )));
        }

        Ok(Operator::SingleStageJoin(SingleStageJoinOperator {
            name: qualified_name(joined),
            join_algo: JoinAlgorithm::BroadcastChain,
            inputs: JoinInputs::Ready(inputs),
            small_child: None,
            large_child: None,
        }))
    }

    /// An ordinary broadcast join. `child` is the operator of a joined left
    /// child, whose output files feed the left side.
    fn plain_broadcast_join(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
        child: Option<Operator>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        let right = expect_base(&join.right)?;
        let right_splits = self.input_splits(&join.right)?;

        let (left_splits, left_info_base) = match &child {
            None => {
                let left = expect_base(&join.left)?;
                (self.input_splits(&join.left)?, Some(left))
            }
            Some(op) => {
                if op.has_pending_chain() {
                    return Err(PlannerError::invalid_plan(format!(
                        "broadcast chain join under {} cannot be completed here",
                        joined.table_name
                    )));
                }
                (files_to_splits(op.output_paths()), None)
            }
        };
        let make_left_info = |splits: Vec<InputSplit>| match left_info_base {
            Some(base) => self.base_broadcast_info(base, splits, join.left_key_column_ids.clone()),
            None => self.intermediate_broadcast_info(
                &join.left,
                splits,
                join.left_key_column_ids.clone(),
            ),
        };
        let make_right_info =
            |splits: Vec<InputSplit>| self.base_broadcast_info(right, splits, join.right_key_column_ids.clone());

        let (post_partition, post_partition_info) = self.post_partition(parent);
        let folder = self.table_folder(&joined.schema_name, &joined.table_name);

        // Both sides unfiltered means every split carries its full weight;
        // smaller batches keep the latency of the widest worker down.
        let unfiltered = child.is_none()
            && join
                .left
                .as_base()
                .is_some_and(|t| t.filter.is_trivial())
            && right.filter.is_trivial();
        let batch_size = if unfiltered {
            2
        } else {
            self.config.intra_worker_parallelism
        };

        let mut inputs = Vec::new();
        match join.join_endian {
            JoinEndian::SmallLeft => {
                let small_table = make_left_info(left_splits);
                let large_splits = self.adjust_broadcast_input_splits(
                    &join.left,
                    &join.right,
                    right_splits,
                    parent,
                );
                for (output_id, batch) in large_splits.chunks(batch_size).enumerate() {
                    inputs.push(JoinInput::Broadcast(BroadcastJoinInput {
                        query_id: self.query_id,
                        small_table: small_table.clone(),
                        large_table: make_right_info(batch.to_vec()),
                        join_info: JoinInfo {
                            join_type: join.join_type,
                            small_column_alias: join.left_column_alias.clone(),
                            large_column_alias: join.right_column_alias.clone(),
                            small_projection: join.left_projection.clone(),
                            large_projection: join.right_projection.clone(),
                            post_partition,
                            post_partition_info: post_partition_info.clone(),
                        },
                        partial_aggregation_present: false,
                        partial_aggregation_info: None,
                        output: MultiOutputInfo {
                            path: folder.clone(),
                            storage_info: self.intermediate_storage(),
                            encoding: true,
                            file_names: vec![format!("{output_id}/join")],
                        },
                    }));
                }
            }
            JoinEndian::LargeLeft => {
                let small_table = make_right_info(right_splits);
                let large_splits = self.adjust_broadcast_input_splits(
                    &join.right,
                    &join.left,
                    left_splits,
                    parent,
                );
                for (output_id, batch) in large_splits.chunks(batch_size).enumerate() {
                    inputs.push(JoinInput::Broadcast(BroadcastJoinInput {
                        query_id: self.query_id,
                        small_table: small_table.clone(),
                        large_table: make_left_info(batch.to_vec()),
                        join_info: JoinInfo {
                            join_type: join.join_type.flip(),
                            small_column_alias: join.right_column_alias.clone(),
                            large_column_alias: join.left_column_alias.clone(),
                            small_projection: join.right_projection.clone(),
                            large_projection: join.left_projection.clone(),
                            post_partition,
                            post_partition_info: post_partition_info.clone(),
                        },
                        partial_aggregation_present: false,
                        partial_aggregation_info: None,
                        output: MultiOutputInfo {
                            path: folder.clone(),
                            storage_info: self.intermediate_storage(),
                            encoding: true,
                            file_names: vec![format!("{output_id}/join")],
                        },
                    }));
                }
            }
        }

        let (small_child, large_child) = match (join.join_endian, child) {
            (_, None) => (None, None),
            (JoinEndian::SmallLeft, Some(op)) => (Some(Box::new(op)), None),
            (JoinEndian::LargeLeft, Some(op)) => (None, Some(Box::new(op))),
        };
        Ok(Operator::SingleStageJoin(SingleStageJoinOperator {
            name: qualified_name(joined),
            join_algo: JoinAlgorithm::Broadcast,
            inputs: JoinInputs::Ready(inputs),
            small_child,
            large_child,
        }))
    }

    /// Re-packs the large-side splits of a broadcast join whose output is
    /// read by every parent worker, trading fan-out for fewer intermediate
    /// files when the small side is filtered much harder than the large one.
    fn adjust_broadcast_input_splits(
        &self,
        small: &Table,
        large: &Table,
        splits: Vec<InputSplit>,
        parent: Option<ParentJoin<'_>>,
    ) -> Vec<InputSplit> {
        let broadcast_readable = parent.is_some_and(|p| {
            p.join().join_algo == JoinAlgorithm::Partitioned
                || (p.is_small_left_broadcast() && p.side == JoinSide::Left)
        });
        if !broadcast_readable {
            return splits;
        }
        let num_workers = splits.len().div_ceil(self.config.intra_worker_parallelism);
        if num_workers <= BROADCAST_REPACK_WORKER_THRESHOLD {
            return splits;
        }
        let small_selectivity = self.advisor.table_selectivity(small);
        let large_selectivity = self.advisor.table_selectivity(large);
        // Negative selectivity means unknown; both must be known to compare.
        if !(small_selectivity >= 0.0
            && large_selectivity > 0.0
            && small_selectivity < large_selectivity)
        {
            return splits;
        }
        if small_selectivity / large_selectivity >= 0.25 {
            return splits;
        }
        let input_infos: Vec<InputInfo> = splits
            .iter()
            .flat_map(|s| s.input_infos.iter().cloned())
            .collect();
        let per_split = input_infos.len().div_ceil(splits.len()) * 2;
        tracing::debug!(
            small = %small.table_name(),
            large = %large.table_name(),
            per_split,
            "re-packing broadcast input splits"
        );
        input_infos
            .chunks(per_split)
            .map(|chunk| InputSplit::new(chunk.to_vec()))
            .collect()
    }

    /// Whether the parent requires this join to hash-partition its output,
    /// and on which keys.
    fn post_partition(&self, parent: Option<ParentJoin<'_>>) -> (bool, Option<PartitionInfo>) {
        let Some(parent) = parent else {
            return (false, None);
        };
        let join = parent.join();
        if join.join_algo != JoinAlgorithm::Partitioned {
            return (false, None);
        }
        let key_column_ids = match parent.side {
            JoinSide::Left => join.left_key_column_ids.clone(),
            JoinSide::Right => join.right_key_column_ids.clone(),
        };
        let num_partitions = self
            .advisor
            .num_partitions(&join.left, &join.right, join.join_endian);
        (
            true,
            Some(PartitionInfo {
                key_column_ids,
                num_partitions,
            }),
        )
    }

    fn compile_partitioned_join(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        if join.is_multi_pipeline() {
            return self.compile_multi_pipeline_partitioned(joined, parent);
        }
        let right = expect_base(&join.right)?;
        let num_partitions = self
            .advisor
            .num_partitions(&join.left, &join.right, join.join_endian);
        let (post_partition, post_partition_info) = self.post_partition(parent);
        let folder = self.table_folder(&joined.schema_name, &joined.table_name);

        // The base right side is always partitioned here.
        let right_partition_projection = partition_projection(&join.right, &join.right_projection);
        let right_splits = self.input_splits(&join.right)?;
        let right_partition_inputs = self.partition_inputs(
            right,
            right_splits,
            &join.right_key_column_ids,
            &right_partition_projection,
            num_partitions,
            &format!("{folder}{}_right/", right.table_name),
        );
        let right_info = PartitionedTableInfo {
            table_name: right.table_name.clone(),
            base: true,
            columns_to_read: rewrite_columns_to_read(&right.column_names, &right_partition_projection),
            input_files: right_partition_inputs
                .iter()
                .map(|p| p.output.path.clone())
                .collect(),
            key_column_ids: rewrite_key_column_ids(
                &join.right_key_column_ids,
                &right_partition_projection,
            ),
            parallelism: self.config.intra_worker_parallelism,
            storage_info: self.input_storage(),
        };
        let right_join_projection =
            rewrite_projection(&join.right_projection, &right_partition_projection);

        let (left_info, left_join_projection, left_partition_inputs, child) = match &*join.left {
            Table::Base(left) => {
                let projection = partition_projection(&join.left, &join.left_projection);
                let left_splits = self.input_splits(&join.left)?;
                let partition_inputs = self.partition_inputs(
                    left,
                    left_splits,
                    &join.left_key_column_ids,
                    &projection,
                    num_partitions,
                    &format!("{folder}{}_left/", left.table_name),
                );
                let info = PartitionedTableInfo {
                    table_name: left.table_name.clone(),
                    base: true,
                    columns_to_read: rewrite_columns_to_read(&left.column_names, &projection),
                    input_files: partition_inputs
                        .iter()
                        .map(|p| p.output.path.clone())
                        .collect(),
                    key_column_ids: rewrite_key_column_ids(&join.left_key_column_ids, &projection),
                    parallelism: self.config.intra_worker_parallelism,
                    storage_info: self.input_storage(),
                };
                let join_projection = rewrite_projection(&join.left_projection, &projection);
                (info, join_projection, partition_inputs, None)
            }
            Table::Joined(left_joined) => {
                // The child hash-partitions its own output (it sees this
                // join through its parent hint), so no partition workers are
                // needed on this side.
                let hint = ParentJoin {
                    joined,
                    side: JoinSide::Left,
                };
                let child = self.compile_join(left_joined, Some(hint))?;
                if child.has_pending_chain() {
                    return Err(PlannerError::invalid_plan(format!(
                        "broadcast chain join under {} cannot be completed here",
                        joined.table_name
                    )));
                }
                let info = PartitionedTableInfo {
                    table_name: left_joined.table_name.clone(),
                    base: false,
                    columns_to_read: left_joined.column_names.clone(),
                    input_files: child.output_paths(),
                    key_column_ids: join.left_key_column_ids.clone(),
                    parallelism: self.config.intra_worker_parallelism,
                    storage_info: self.intermediate_storage(),
                };
                (info, join.left_projection.clone(), vec![], Some(child))
            }
            Table::Aggregated(_) => {
                return Err(PlannerError::invalid_plan(format!(
                    "join {} reads an aggregated table, which must be the plan root",
                    joined.table_name
                )));
            }
        };

        let operator = self.partitioned_join_operator(
            joined,
            num_partitions,
            EndianSides {
                left_info,
                right_info,
                left_join_projection,
                right_join_projection,
                left_partition_inputs,
                right_partition_inputs,
                left_child: child,
                right_child: None,
            },
            post_partition,
            post_partition_info,
        );
        Ok(operator)
    }

    fn compile_multi_pipeline_broadcast(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        let left_joined = expect_joined(&join.left)?;
        let right_joined = expect_joined(&join.right)?;

        let hint = ParentJoin {
            joined,
            side: JoinSide::Left,
        };
        let left_op = self.compile_join(left_joined, Some(hint))?;
        let pending = match left_op {
            Operator::SingleStageJoin(SingleStageJoinOperator {
                join_algo: JoinAlgorithm::BroadcastChain,
                inputs: JoinInputs::PendingChain(pending),
                ..
            }) => pending,
            _ => {
                // Known limitation: a small-left broadcast whose left
                // pipeline does not reduce to a chain cannot be compiled.
                return Err(PlannerError::invalid_plan(format!(
                    "left pipeline of broadcast join {} cannot be fused into a chain join",
                    joined.table_name
                )));
            }
        };
        let right_op = self.compile_join(right_joined, None)?;

        let (post_partition, post_partition_info) = self.post_partition(parent);
        let folder = self.table_folder(&joined.schema_name, &joined.table_name);

        match right_op.join_algo() {
            Some(JoinAlgorithm::Broadcast | JoinAlgorithm::BroadcastChain) => {
                let large_splits = files_to_splits(right_op.output_paths());
                let mut inputs = Vec::new();
                for (output_id, batch) in large_splits
                    .chunks(self.config.intra_worker_parallelism)
                    .enumerate()
                {
                    let large_table = self.intermediate_broadcast_info(
                        &join.right,
                        batch.to_vec(),
                        join.right_key_column_ids.clone(),
                    );
                    let final_link = ChainJoinInfo {
                        join_type: join.join_type,
                        small_column_alias: join.left_column_alias.clone(),
                        large_column_alias: join.right_column_alias.clone(),
                        key_column_ids: join.left_key_column_ids.clone(),
                        small_projection: join.left_projection.clone(),
                        large_projection: join.right_projection.clone(),
                        post_partition,
                        post_partition_info: post_partition_info.clone(),
                    };
                    let join_info = JoinInfo {
                        join_type: join.join_type,
                        small_column_alias: join.left_column_alias.clone(),
                        large_column_alias: join.right_column_alias.clone(),
                        small_projection: join.left_projection.clone(),
                        large_projection: join.right_projection.clone(),
                        post_partition,
                        post_partition_info: post_partition_info.clone(),
                    };
                    let output = MultiOutputInfo {
                        path: folder.clone(),
                        storage_info: self.intermediate_storage(),
                        encoding: true,
                        file_names: vec![format!("{output_id}/join")],
                    };
                    inputs.push(JoinInput::BroadcastChain(pending.complete(
                        self.query_id,
                        large_table,
                        final_link,
                        join_info,
                        output,
                    )));
                }
                Ok(Operator::SingleStageJoin(SingleStageJoinOperator {
                    name: qualified_name(joined),
                    join_algo: JoinAlgorithm::BroadcastChain,
                    inputs: JoinInputs::Ready(inputs),
                    small_child: None,
                    large_child: Some(Box::new(right_op)),
                }))
            }
            Some(JoinAlgorithm::Partitioned) => {
                let Operator::PartitionedJoin(right_pj) = right_op else {
                    unreachable!("partitioned algorithm implies a partitioned join operator");
                };
                let (chain_tables, mut chain_join_infos) = pending.into_parts();
                chain_join_infos.push(ChainJoinInfo {
                    join_type: join.join_type,
                    small_column_alias: join.left_column_alias.clone(),
                    large_column_alias: join.right_column_alias.clone(),
                    key_column_ids: join.left_key_column_ids.clone(),
                    small_projection: join.left_projection.clone(),
                    large_projection: join.right_projection.clone(),
                    post_partition,
                    post_partition_info,
                });

                let inputs: Vec<JoinInput> = right_pj
                    .inputs
                    .into_iter()
                    .map(|input| {
                        let p = input.into_partitioned().map_err(|_| {
                            PlannerError::invalid_plan(format!(
                                "right pipeline of broadcast join {} is already fused with a chain",
                                joined.table_name
                            ))
                        })?;
                        Ok(JoinInput::PartitionedChain(PartitionedChainJoinInput {
                            query_id: self.query_id,
                            chain_tables: chain_tables.clone(),
                            chain_join_infos: chain_join_infos.clone(),
                            small_table: p.small_table,
                            large_table: p.large_table,
                            join_info: p.join_info,
                            partial_aggregation_present: false,
                            partial_aggregation_info: None,
                            // The worker's final product is this join's result.
                            output: MultiOutputInfo {
                                path: folder.clone(),
                                storage_info: p.output.storage_info,
                                encoding: p.output.encoding,
                                file_names: p.output.file_names,
                            },
                        }))
                    })
                    .try_collect::<_, _, PlannerError>()?;
                Ok(Operator::PartitionedJoin(PartitionedJoinOperator {
                    name: qualified_name(joined),
                    join_algo: JoinAlgorithm::PartitionedChain,
                    num_partitions: right_pj.num_partitions,
                    inputs,
                    small_partition_inputs: right_pj.small_partition_inputs,
                    large_partition_inputs: right_pj.large_partition_inputs,
                    small_child: right_pj.small_child,
                    large_child: right_pj.large_child,
                }))
            }
            _ => Err(PlannerError::invalid_plan(format!(
                "right pipeline of broadcast join {} is already fused with a chain",
                joined.table_name
            ))),
        }
    }

    fn compile_multi_pipeline_partitioned(
        &self,
        joined: &JoinedTable,
        parent: Option<ParentJoin<'_>>,
    ) -> PlannerResult<Operator> {
        let join = &joined.join;
        let left_joined = expect_joined(&join.left)?;
        let right_joined = expect_joined(&join.right)?;

        let left_op = self.compile_join(
            left_joined,
            Some(ParentJoin {
                joined,
                side: JoinSide::Left,
            }),
        )?;
        let right_op = self.compile_join(
            right_joined,
            Some(ParentJoin {
                joined,
                side: JoinSide::Right,
            }),
        )?;
        if left_op.has_pending_chain() || right_op.has_pending_chain() {
            return Err(PlannerError::invalid_plan(format!(
                "broadcast chain join under {} cannot be completed here",
                joined.table_name
            )));
        }

        let num_partitions = self
            .advisor
            .num_partitions(&join.left, &join.right, join.join_endian);
        let (post_partition, post_partition_info) = self.post_partition(parent);

        // Both children hash-partition their outputs for this join.
        let left_info = PartitionedTableInfo {
            table_name: left_joined.table_name.clone(),
            base: false,
            columns_to_read: left_joined.column_names.clone(),
            input_files: left_op.output_paths(),
            key_column_ids: join.left_key_column_ids.clone(),
            parallelism: self.config.intra_worker_parallelism,
            storage_info: self.intermediate_storage(),
        };
        let right_info = PartitionedTableInfo {
            table_name: right_joined.table_name.clone(),
            base: false,
            columns_to_read: right_joined.column_names.clone(),
            input_files: right_op.output_paths(),
            key_column_ids: join.right_key_column_ids.clone(),
            parallelism: self.config.intra_worker_parallelism,
            storage_info: self.intermediate_storage(),
        };

        let operator = self.partitioned_join_operator(
            joined,
            num_partitions,
            EndianSides {
                left_info,
                right_info,
                left_join_projection: join.left_projection.clone(),
                right_join_projection: join.right_projection.clone(),
                left_partition_inputs: vec![],
                right_partition_inputs: vec![],
                left_child: Some(left_op),
                right_child: Some(right_op),
            },
            post_partition,
            post_partition_info,
        );
        Ok(operator)
    }

    /// Emits one [`PartitionedJoinInput`] per hash bucket and assembles the
    /// operator, resolving which side is small by the join endian.
    fn partitioned_join_operator(
        &self,
        joined: &JoinedTable,
        num_partitions: usize,
        sides: EndianSides,
        post_partition: bool,
        post_partition_info: Option<PartitionInfo>,
    ) -> Operator {
        let join = &joined.join;
        let folder = self.table_folder(&joined.schema_name, &joined.table_name);
        let (
            join_type,
            small_table,
            large_table,
            small_alias,
            large_alias,
            small_projection,
            large_projection,
            small_partition_inputs,
            large_partition_inputs,
            small_child,
            large_child,
        ) = match join.join_endian {
            JoinEndian::SmallLeft => (
                join.join_type,
                sides.left_info,
                sides.right_info,
                join.left_column_alias.clone(),
                join.right_column_alias.clone(),
                sides.left_join_projection,
                sides.right_join_projection,
                sides.left_partition_inputs,
                sides.right_partition_inputs,
                sides.left_child,
                sides.right_child,
            ),
            JoinEndian::LargeLeft => (
                join.join_type.flip(),
                sides.right_info,
                sides.left_info,
                join.right_column_alias.clone(),
                join.left_column_alias.clone(),
                sides.right_join_projection,
                sides.left_join_projection,
                sides.right_partition_inputs,
                sides.left_partition_inputs,
                sides.right_child,
                sides.left_child,
            ),
        };

        let mut inputs = Vec::with_capacity(num_partitions);
        for hash_value in 0..num_partitions {
            let mut file_names = vec![format!("{hash_value}/join")];
            if join_type.writes_left_tail() {
                file_names.push(format!("{hash_value}/join_left"));
            }
            inputs.push(JoinInput::Partitioned(PartitionedJoinInput {
                query_id: self.query_id,
                small_table: small_table.clone(),
                large_table: large_table.clone(),
                join_info: PartitionedJoinInfo {
                    join_type,
                    small_column_alias: small_alias.clone(),
                    large_column_alias: large_alias.clone(),
                    small_projection: small_projection.clone(),
                    large_projection: large_projection.clone(),
                    num_partitions,
                    hash_values: vec![hash_value],
                    post_partition,
                    post_partition_info: post_partition_info.clone(),
                },
                partial_aggregation_present: false,
                partial_aggregation_info: None,
                output: MultiOutputInfo {
                    path: folder.clone(),
                    storage_info: self.intermediate_storage(),
                    encoding: true,
                    file_names,
                },
            }));
        }

        Operator::PartitionedJoin(PartitionedJoinOperator {
            name: qualified_name(joined),
            join_algo: JoinAlgorithm::Partitioned,
            num_partitions,
            inputs,
            small_partition_inputs,
            large_partition_inputs,
            small_child: small_child.map(Box::new),
            large_child: large_child.map(Box::new),
        })
    }

    /// Partition workers for a base table: each scans a batch of input
    /// splits, evaluates the filter, and writes one partitioned file. The
    /// partitioned files stay on the input storage so the joiners read them
    /// where they read base data.
    fn partition_inputs(
        &self,
        table: &BaseTable,
        splits: Vec<InputSplit>,
        key_column_ids: &[usize],
        projection: &[bool],
        num_partitions: usize,
        folder: &str,
    ) -> Vec<PartitionInput> {
        splits
            .chunks(self.config.intra_worker_parallelism)
            .enumerate()
            .map(|(output_id, batch)| PartitionInput {
                query_id: self.query_id,
                table_info: ScanTableInfo {
                    table_name: table.table_name.clone(),
                    base: true,
                    columns_to_read: table.column_names.clone(),
                    input_splits: batch.to_vec(),
                    filter: table.filter.to_json(),
                    storage_info: self.input_storage(),
                },
                projection: projection.to_vec(),
                partition_info: PartitionInfo {
                    key_column_ids: key_column_ids.to_vec(),
                    num_partitions,
                },
                output: OutputInfo {
                    path: format!("{folder}{output_id}/part"),
                    storage_info: self.input_storage(),
                    encoding: true,
                },
            })
            .collect()
    }

    fn base_broadcast_info(
        &self,
        table: &BaseTable,
        input_splits: Vec<InputSplit>,
        key_column_ids: Vec<usize>,
    ) -> BroadcastTableInfo {
        BroadcastTableInfo {
            table_name: table.table_name.clone(),
            base: true,
            columns_to_read: table.column_names.clone(),
            input_splits,
            key_column_ids,
            filter: table.filter.to_json(),
            storage_info: self.input_storage(),
        }
    }

    fn intermediate_broadcast_info(
        &self,
        table: &Table,
        input_splits: Vec<InputSplit>,
        key_column_ids: Vec<usize>,
    ) -> BroadcastTableInfo {
        BroadcastTableInfo {
            table_name: table.table_name().to_owned(),
            base: false,
            columns_to_read: table.column_names().to_vec(),
            input_splits,
            key_column_ids,
            filter: TableScanFilter::none(table.schema_name(), table.table_name()).to_json(),
            storage_info: self.intermediate_storage(),
        }
    }
}

/// The two sides of a partitioned join before endian resolution.
struct EndianSides {
    left_info: PartitionedTableInfo,
    right_info: PartitionedTableInfo,
    left_join_projection: Vec<bool>,
    right_join_projection: Vec<bool>,
    left_partition_inputs: Vec<PartitionInput>,
    right_partition_inputs: Vec<PartitionInput>,
    left_child: Option<Operator>,
    right_child: Option<Operator>,
}

fn qualified_name(joined: &JoinedTable) -> String {
    format!("{}.{}", joined.schema_name, joined.table_name)
}

fn expect_base(table: &Table) -> PlannerResult<&BaseTable> {
    table.as_base().ok_or_else(|| {
        PlannerError::invalid_plan(format!(
            "table {} must be a base table in this position",
            table.table_name()
        ))
    })
}

fn expect_joined(table: &Table) -> PlannerResult<&JoinedTable> {
    table.as_joined().ok_or_else(|| {
        PlannerError::invalid_plan(format!(
            "table {} must be a joined table in this position",
            table.table_name()
        ))
    })
}

fn files_to_splits(files: Vec<String>) -> Vec<InputSplit> {
    files
        .into_iter()
        .map(|file| InputSplit::single(InputInfo::whole_file(file)))
        .collect()
}

/// The columns a partition worker writes: everything the join reads, plus
/// the filter columns of a base table. Joined tables keep all columns.
fn partition_projection(table: &Table, join_projection: &[bool]) -> Vec<bool> {
    match table {
        Table::Base(base) => {
            let mut keep: FixedBitSet = base.filter.referenced_columns(join_projection.len());
            for (id, kept) in join_projection.iter().enumerate() {
                if *kept {
                    keep.insert(id);
                }
            }
            (0..join_projection.len()).map(|id| keep.contains(id)).collect()
        }
        _ => vec![true; join_projection.len()],
    }
}

/// Restricts a column list to the columns a partition projection keeps.
fn rewrite_columns_to_read(columns: &[String], keep: &[bool]) -> Vec<String> {
    columns
        .iter()
        .zip(keep)
        .filter(|(_, kept)| **kept)
        .map(|(column, _)| column.clone())
        .collect()
}

/// Re-indexes key column ids into the positions they occupy among the kept
/// columns.
fn rewrite_key_column_ids(key_column_ids: &[usize], keep: &[bool]) -> Vec<usize> {
    key_column_ids
        .iter()
        .map(|id| keep[..*id].iter().filter(|kept| **kept).count())
        .collect()
}

/// Restricts a join projection to the kept columns; filter-only columns drop
/// out of the join here.
fn rewrite_projection(join_projection: &[bool], keep: &[bool]) -> Vec<bool> {
    keep.iter()
        .enumerate()
        .filter(|(_, kept)| **kept)
        .map(|(id, _)| join_projection[id])
        .collect()
}
