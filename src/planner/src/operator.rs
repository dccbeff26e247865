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

//! The operator tree returned by one compilation. Each operator holds the
//! ordered worker inputs of one execution stage plus the child operators
//! that must be submitted first.

use enum_as_inner::EnumAsInner;

use crate::plan::physical::{
    AggregationInput, IncompleteChainJoin, JoinInput, PartitionInput, ScanInput,
};
use crate::plan::JoinAlgorithm;

/// A node of the execution DAG.
#[derive(Debug, PartialEq, EnumAsInner)]
pub enum Operator {
    SingleStageJoin(SingleStageJoinOperator),
    PartitionedJoin(PartitionedJoinOperator),
    Aggregation(AggregationOperator),
}

impl Operator {
    pub fn name(&self) -> &str {
        match self {
            Self::SingleStageJoin(op) => &op.name,
            Self::PartitionedJoin(op) => &op.name,
            Self::Aggregation(op) => &op.name,
        }
    }

    pub fn join_algo(&self) -> Option<JoinAlgorithm> {
        match self {
            Self::SingleStageJoin(op) => Some(op.join_algo),
            Self::PartitionedJoin(op) => Some(op.join_algo),
            Self::Aggregation(_) => None,
        }
    }

    /// The files this operator's own worker inputs produce, in submission
    /// order. A parent join consumes them as its input files.
    pub fn output_paths(&self) -> Vec<String> {
        match self {
            Self::SingleStageJoin(op) => match &op.inputs {
                JoinInputs::Ready(inputs) => {
                    inputs.iter().flat_map(|i| i.output().file_paths()).collect()
                }
                JoinInputs::PendingChain(_) => vec![],
            },
            Self::PartitionedJoin(op) => op
                .inputs
                .iter()
                .flat_map(|i| i.output().file_paths())
                .collect(),
            Self::Aggregation(op) => vec![op.final_input.output.path.clone()],
        }
    }

    /// The ready join inputs of a join operator, for parents that rewrite
    /// their child's outputs in place.
    pub fn join_inputs_mut(&mut self) -> Option<&mut Vec<JoinInput>> {
        match self {
            Self::SingleStageJoin(op) => match &mut op.inputs {
                JoinInputs::Ready(inputs) => Some(inputs),
                JoinInputs::PendingChain(_) => None,
            },
            Self::PartitionedJoin(op) => Some(&mut op.inputs),
            Self::Aggregation(_) => None,
        }
    }

    pub fn join_inputs(&self) -> Option<&[JoinInput]> {
        match self {
            Self::SingleStageJoin(op) => match &op.inputs {
                JoinInputs::Ready(inputs) => Some(inputs),
                JoinInputs::PendingChain(_) => None,
            },
            Self::PartitionedJoin(op) => Some(&op.inputs),
            Self::Aggregation(_) => None,
        }
    }

    /// Whether any operator in this subtree still holds an incomplete chain
    /// join. A compiled root must never.
    pub fn has_pending_chain(&self) -> bool {
        let pending_here = matches!(
            self,
            Self::SingleStageJoin(SingleStageJoinOperator {
                inputs: JoinInputs::PendingChain(_),
                ..
            })
        );
        pending_here || self.children().into_iter().any(Operator::has_pending_chain)
    }

    pub fn children(&self) -> Vec<&Operator> {
        let (small, large, child) = match self {
            Self::SingleStageJoin(op) => (op.small_child.as_deref(), op.large_child.as_deref(), None),
            Self::PartitionedJoin(op) => (op.small_child.as_deref(), op.large_child.as_deref(), None),
            Self::Aggregation(op) => (None, None, op.child.as_deref()),
        };
        [small, large, child].into_iter().flatten().collect()
    }
}

/// The inputs of a single-stage (broadcast family) join operator.
///
/// A chain join under construction is an explicit state rather than a
/// half-initialized input, so completion is a total function and an
/// incomplete chain can never be submitted.
#[derive(Debug, PartialEq)]
pub enum JoinInputs {
    Ready(Vec<JoinInput>),
    PendingChain(IncompleteChainJoin),
}

#[derive(Debug, PartialEq)]
pub struct SingleStageJoinOperator {
    pub name: String,
    pub join_algo: JoinAlgorithm,
    pub inputs: JoinInputs,
    pub small_child: Option<Box<Operator>>,
    pub large_child: Option<Box<Operator>>,
}

#[derive(Debug, PartialEq)]
pub struct PartitionedJoinOperator {
    pub name: String,
    pub join_algo: JoinAlgorithm,
    pub num_partitions: usize,
    pub inputs: Vec<JoinInput>,
    /// Partition workers feeding the small side; empty when that side is
    /// pre-partitioned by a child join.
    pub small_partition_inputs: Vec<PartitionInput>,
    pub large_partition_inputs: Vec<PartitionInput>,
    pub small_child: Option<Box<Operator>>,
    pub large_child: Option<Box<Operator>>,
}

#[derive(Debug, PartialEq)]
pub struct AggregationOperator {
    pub name: String,
    /// Partial-aggregation scans; empty when the origin is a join.
    pub scan_inputs: Vec<ScanInput>,
    pub pre_aggr_inputs: Vec<AggregationInput>,
    pub final_input: AggregationInput,
    pub child: Option<Box<Operator>>,
}
