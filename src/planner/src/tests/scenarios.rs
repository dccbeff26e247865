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

//! End-to-end compilations of small plans, checked structurally.

use std::collections::HashSet;

use assert_matches::assert_matches;
use pixels_common::{Scheme, StorageInfo};
use pretty_assertions::assert_eq;

use super::fixtures::{base_table, join_all, TestEnv, SCHEMA};
use crate::error::PlannerError;
use crate::operator::{JoinInputs, Operator};
use crate::plan::{
    Aggregation, AggregatedTable, FunctionType, JoinAlgorithm, JoinEndian, OutputEndpoint, Table,
};

fn ready_inputs(operator: &Operator) -> &[crate::plan::physical::JoinInput] {
    operator.join_inputs().expect("inputs must be ready")
}

#[test]
fn test_two_table_broadcast() {
    let env = TestEnv::new();
    env.add_base_table("r", &["a", "b"], 4, 2);
    env.add_base_table("s", &["c", "d"], 8, 2);
    let root = join_all(
        "r_join_s",
        base_table("r", &["a", "b"], true),
        base_table("s", &["c", "d"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    let join_op = operator.as_single_stage_join().unwrap();
    assert_eq!(join_op.join_algo, JoinAlgorithm::Broadcast);

    // 8 files at split size 2 give 4 large splits, paired per worker.
    let inputs = ready_inputs(&operator);
    assert_eq!(inputs.len(), 2);

    let mut large_files = Vec::new();
    for input in inputs {
        let input = input.as_broadcast().unwrap();
        // The small side is replicated whole into every worker.
        assert_eq!(input.small_table.input_splits.len(), 2);
        assert_eq!(input.small_table.table_name, "r");
        assert!(!input.join_info.post_partition);
        for split in &input.large_table.input_splits {
            for info in &split.input_infos {
                large_files.push(info.path.clone());
            }
        }
    }
    // The large side is sharded disjointly and completely.
    assert_eq!(large_files.len(), 8);
    assert_eq!(large_files.iter().collect::<HashSet<_>>().len(), 8);
}

#[test]
fn test_three_table_chain() {
    let env = TestEnv::new();
    env.add_base_table("a", &["k", "x"], 2, 2);
    env.add_base_table("b", &["k", "y"], 2, 2);
    env.add_base_table("c", &["k", "z"], 6, 2);
    let t1 = join_all(
        "t1",
        base_table("a", &["k", "x"], false),
        base_table("b", &["k", "y"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let root = join_all(
        "t2",
        t1,
        base_table("c", &["k", "z"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    assert!(!operator.has_pending_chain());
    let join_op = operator.as_single_stage_join().unwrap();
    assert_eq!(join_op.join_algo, JoinAlgorithm::BroadcastChain);

    // 3 large splits over 2 slots per worker.
    let inputs = ready_inputs(&operator);
    assert_eq!(inputs.len(), 2);
    for input in inputs {
        let input = input.as_broadcast_chain().unwrap();
        let chained: Vec<_> = input
            .chain_tables
            .iter()
            .map(|t| t.table_name.as_str())
            .collect();
        assert_eq!(chained, vec!["a", "b"]);
        // One link per chain table once the large side is bound.
        assert_eq!(input.chain_join_infos.len(), input.chain_tables.len());
        assert_eq!(input.large_table.table_name, "c");
        // The first link is keyed for the probe of the enclosing join.
        assert_eq!(input.chain_join_infos[0].key_column_ids, vec![0]);
    }
}

#[test]
fn test_partitioned_under_partitioned_post_partitions_children() {
    let env = TestEnv::new();
    for name in ["a", "b", "c", "d"] {
        env.add_base_table(name, &["k", "v"], 4, 2);
    }
    env.advisor.set_partitions("a", "b", 8);
    env.advisor.set_partitions("c", "d", 8);
    env.advisor.set_partitions("t_ab", "t_cd", 16);

    let t_ab = join_all(
        "t_ab",
        base_table("a", &["k", "v"], false),
        base_table("b", &["k", "v"], false),
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );
    let t_cd = join_all(
        "t_cd",
        base_table("c", &["k", "v"], false),
        base_table("d", &["k", "v"], false),
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );
    let root = join_all(
        "root_j",
        t_ab,
        t_cd,
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    let root_op = operator.as_partitioned_join().unwrap();
    assert_eq!(root_op.num_partitions, 16);
    assert_eq!(root_op.inputs.len(), 16);
    // Both sides are pre-partitioned by the children.
    assert!(root_op.small_partition_inputs.is_empty());
    assert!(root_op.large_partition_inputs.is_empty());

    // Every bucket is covered exactly once.
    let buckets: Vec<usize> = root_op
        .inputs
        .iter()
        .flat_map(|i| i.as_partitioned().unwrap().join_info.hash_values.clone())
        .collect();
    assert_eq!(buckets, (0..16).collect::<Vec<_>>());

    for (child, key_side) in [
        (root_op.small_child.as_deref().unwrap(), "left"),
        (root_op.large_child.as_deref().unwrap(), "right"),
    ] {
        let child_op = child.as_partitioned_join().unwrap();
        assert_eq!(child_op.num_partitions, 8);
        // Partition workers exist for both base sides of the child.
        assert_eq!(child_op.small_partition_inputs.len(), 1);
        assert_eq!(child_op.large_partition_inputs.len(), 1);
        for input in &child_op.inputs {
            let info = &input.as_partitioned().unwrap().join_info;
            assert!(info.post_partition, "{key_side} child must post-partition");
            let post = info.post_partition_info.as_ref().unwrap();
            assert_eq!(post.num_partitions, 16);
            assert_eq!(post.key_column_ids, vec![0]);
        }
    }
}

#[test]
fn test_broadcast_child_under_partitioned_parent() {
    let env = TestEnv::new();
    env.add_base_table("a", &["k", "v"], 4, 2);
    env.add_base_table("b", &["k", "v"], 4, 2);
    env.add_base_table("c", &["k", "v"], 8, 2);
    env.advisor.set_partitions("t_ab", "c", 4);

    let t_ab = join_all(
        "t_ab",
        base_table("a", &["k", "v"], false),
        base_table("b", &["k", "v"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let root = join_all(
        "root_j",
        t_ab,
        base_table("c", &["k", "v"], false),
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    let root_op = operator.as_partitioned_join().unwrap();
    assert_eq!(root_op.num_partitions, 4);
    // The joined left side is pre-partitioned; only the base right side
    // needs partition workers.
    assert!(root_op.small_partition_inputs.is_empty());
    assert_eq!(root_op.large_partition_inputs.len(), 2);

    let child = root_op.small_child.as_deref().unwrap();
    let child_op = child.as_single_stage_join().unwrap();
    assert_eq!(child_op.join_algo, JoinAlgorithm::Broadcast);
    let child_inputs = ready_inputs(child);
    assert!(!child_inputs.is_empty());
    for input in child_inputs {
        let info = &input.as_broadcast().unwrap().join_info;
        assert!(info.post_partition);
        let post = info.post_partition_info.as_ref().unwrap();
        assert_eq!(post.num_partitions, 4);
        assert_eq!(post.key_column_ids, vec![0]);
    }

    // The parent reads exactly the child's output files, pre-partitioned.
    let small_files = &root_op.inputs[0]
        .as_partitioned()
        .unwrap()
        .small_table
        .input_files;
    assert_eq!(*small_files, child.output_paths());
}

#[test]
fn test_chain_fused_into_partitioned() {
    let env = TestEnv::new();
    env.add_base_table("a", &["k", "x"], 2, 2);
    env.add_base_table("b", &["k", "y"], 2, 2);
    env.add_base_table("c", &["k", "z"], 4, 2);
    env.add_base_table("d", &["k", "u"], 4, 2);
    env.add_base_table("e", &["k", "w"], 4, 2);
    env.advisor.set_partitions("d", "e", 8);

    let t1 = join_all(
        "t1",
        base_table("a", &["k", "x"], false),
        base_table("b", &["k", "y"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let t2 = join_all(
        "t2",
        t1,
        base_table("c", &["k", "z"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let t_de = join_all(
        "t_de",
        base_table("d", &["k", "u"], false),
        base_table("e", &["k", "w"], false),
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );
    let root = join_all(
        "root_j",
        t2,
        t_de,
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    assert!(!operator.has_pending_chain());
    let root_op = operator.as_partitioned_join().unwrap();
    assert_eq!(root_op.join_algo, JoinAlgorithm::PartitionedChain);
    assert_eq!(root_op.num_partitions, 8);
    assert_eq!(root_op.inputs.len(), 8);
    // The fused pipeline inherits the partition workers of the right side.
    assert_eq!(root_op.small_partition_inputs.len(), 1);
    assert_eq!(root_op.large_partition_inputs.len(), 1);

    for input in &root_op.inputs {
        let input = input.as_partitioned_chain().unwrap();
        let chained: Vec<_> = input
            .chain_tables
            .iter()
            .map(|t| t.table_name.as_str())
            .collect();
        // The whole left pipeline was folded into the chain.
        assert_eq!(chained, vec!["a", "b", "c"]);
        assert_eq!(input.chain_join_infos.len(), 3);
        // The last link probes the partitioned side on the enclosing join's
        // keys.
        assert_eq!(input.chain_join_infos[2].key_column_ids, vec![0]);
        assert!(input.output.path.ends_with("/root_j/"));
    }
}

#[test]
fn test_aggregation_with_preaggregate() {
    let env = TestEnv::new();
    let mut config = env.config.clone();
    config.intra_worker_parallelism = 4;
    config.pre_aggr_threshold = 5;
    let env = TestEnv { config, ..env };
    env.add_base_table("g", &["k", "v"], 120, 1);

    let aggregation = Aggregation::new(
        base_table("g", &["k", "v"], false),
        vec![0],
        vec!["gk".to_owned()],
        vec![true],
        vec![1],
        vec!["sv".to_owned()],
        vec!["bigint".to_owned()],
        vec![FunctionType::Sum],
        OutputEndpoint {
            path: "/out/".to_owned(),
            storage: StorageInfo::new(Scheme::Minio, "http://minio:9000", "ak", "sk"),
        },
    )
    .unwrap();
    let root = Table::Aggregated(AggregatedTable::new(
        SCHEMA,
        "agg_g",
        vec!["gk".to_owned(), "sv".to_owned()],
        aggregation,
    ));

    let operator = env.planner().compile(&root).unwrap();
    let agg_op = operator.as_aggregation().unwrap();

    // 120 splits over 4 slots per worker.
    assert_eq!(agg_op.scan_inputs.len(), 30);
    for (i, scan) in agg_op.scan_inputs.iter().enumerate() {
        assert!(scan.partial_aggregation_present);
        assert_eq!(
            scan.output.path,
            format!("/inter/7/{SCHEMA}/agg_g/{i}/partial_aggr")
        );
    }

    // 30 partial files in chunks of 5.
    assert_eq!(agg_op.pre_aggr_inputs.len(), 6);
    for (i, pre) in agg_op.pre_aggr_inputs.iter().enumerate() {
        assert_eq!(pre.aggregated_table_info.input_files.len(), 5);
        assert_eq!(
            pre.output.path,
            format!("/inter/7/{SCHEMA}/agg_g/{i}/pre_aggr")
        );
        assert_eq!(pre.output.storage_info.scheme, Scheme::S3);
    }

    // The final stage reads the pre-aggregated files and writes to the
    // user-specified endpoint.
    assert_eq!(agg_op.final_input.aggregated_table_info.input_files.len(), 6);
    assert_eq!(agg_op.final_input.output.path, "/out/final_aggr");
    assert_eq!(agg_op.final_input.output.storage_info.scheme, Scheme::Minio);
    assert_eq!(
        agg_op.final_input.aggregated_table_info.columns_to_read,
        vec!["gk".to_owned(), "sv".to_owned()]
    );
    assert!(agg_op.child.is_none());
}

#[test]
fn test_base_root_rejected() {
    let env = TestEnv::new();
    env.add_base_table("r", &["a"], 2, 2);
    let err = env
        .planner()
        .compile(&base_table("r", &["a"], false))
        .unwrap_err();
    assert_matches!(err, PlannerError::InvalidPlan(_));
}

#[test]
fn test_unchainable_left_pipeline_rejected() {
    let env = TestEnv::new();
    for name in ["a", "b", "c", "d"] {
        env.add_base_table(name, &["k", "v"], 4, 2);
    }
    // A partitioned left pipeline cannot fold into a broadcast chain.
    let t_ab = join_all(
        "t_ab",
        base_table("a", &["k", "v"], false),
        base_table("b", &["k", "v"], false),
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    );
    let t_cd = join_all(
        "t_cd",
        base_table("c", &["k", "v"], false),
        base_table("d", &["k", "v"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let root = join_all(
        "root_j",
        t_ab,
        t_cd,
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let err = env.planner().compile(&root).unwrap_err();
    assert_matches!(err, PlannerError::InvalidPlan(_));
}

#[test]
fn test_fused_algorithm_rejected_in_input_plan() {
    let env = TestEnv::new();
    env.add_base_table("a", &["k"], 2, 2);
    env.add_base_table("b", &["k"], 2, 2);
    let root = join_all(
        "t",
        base_table("a", &["k"], false),
        base_table("b", &["k"], false),
        JoinAlgorithm::BroadcastChain,
        JoinEndian::SmallLeft,
    );
    let err = env.planner().compile(&root).unwrap_err();
    assert_matches!(err, PlannerError::InvalidPlan(_));
}

#[test]
fn test_metadata_unavailable_is_fatal() {
    let env = TestEnv::new();
    // No tables registered.
    let root = join_all(
        "t",
        base_table("a", &["k"], false),
        base_table("b", &["k"], false),
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    );
    let err = env.planner().compile(&root).unwrap_err();
    assert_matches!(err, PlannerError::MetadataUnavailable(_));
}

#[test]
fn test_large_left_broadcast_flips_sides() {
    let env = TestEnv::new();
    env.add_base_table("big", &["k", "v"], 8, 2);
    env.add_base_table("small", &["k", "w"], 2, 2);
    let root = join_all(
        "t",
        base_table("big", &["k", "v"], true),
        base_table("small", &["k", "w"], true),
        JoinAlgorithm::Broadcast,
        JoinEndian::LargeLeft,
    );

    let operator = env.planner().compile(&root).unwrap();
    let inputs = ready_inputs(&operator);
    // The large left side is sharded: 4 splits over 2 slots.
    assert_eq!(inputs.len(), 2);
    for input in inputs {
        let input = input.as_broadcast().unwrap();
        assert_eq!(input.small_table.table_name, "small");
        assert_eq!(input.large_table.table_name, "big");
    }

    match &operator.as_single_stage_join().unwrap().inputs {
        JoinInputs::Ready(_) => {}
        JoinInputs::PendingChain(_) => panic!("plain broadcast must be ready"),
    }
}
