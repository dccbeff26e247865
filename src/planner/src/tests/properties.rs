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

//! Cross-cutting properties of compiled plans.

use std::collections::HashSet;

use expect_test::expect;
use pretty_assertions::assert_eq;

use super::fixtures::{base_table, join_all, TestEnv, SCHEMA};
use crate::operator::Operator;
use crate::plan::physical::JoinInput;
use crate::plan::{
    BaseTable, CompareOp, Join, JoinAlgorithm, JoinEndian, JoinType, JoinedTable, Predicate,
    Scalar, Table, TableScanFilter,
};

/// Every output file any worker input of the tree writes, in submission
/// order.
fn collect_output_paths(operator: &Operator, paths: &mut Vec<String>) {
    for child in operator.children() {
        collect_output_paths(child, paths);
    }
    match operator {
        Operator::SingleStageJoin(_) => paths.extend(operator.output_paths()),
        Operator::PartitionedJoin(op) => {
            for partition in op
                .small_partition_inputs
                .iter()
                .chain(&op.large_partition_inputs)
            {
                paths.push(partition.output.path.clone());
            }
            paths.extend(operator.output_paths());
        }
        Operator::Aggregation(op) => {
            for scan in &op.scan_inputs {
                paths.push(scan.output.path.clone());
            }
            for pre in &op.pre_aggr_inputs {
                paths.push(pre.output.path.clone());
            }
            paths.push(op.final_input.output.path.clone());
        }
    }
}

fn chain_fused_plan(env: &TestEnv) -> Table {
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
    join_all(
        "root_j",
        t2,
        t_de,
        JoinAlgorithm::Broadcast,
        JoinEndian::SmallLeft,
    )
}

#[test]
fn test_compilation_is_deterministic() {
    let env = TestEnv::new();
    let root = chain_fused_plan(&env);
    let first = env.planner().compile(&root).unwrap();
    let second = env.planner().compile(&root).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_output_paths_are_unique() {
    let env = TestEnv::new();
    let root = chain_fused_plan(&env);
    let operator = env.planner().compile(&root).unwrap();
    let mut paths = Vec::new();
    collect_output_paths(&operator, &mut paths);
    assert!(!paths.is_empty());
    let distinct: HashSet<_> = paths.iter().collect();
    assert_eq!(distinct.len(), paths.len(), "duplicate output path in {paths:?}");
}

#[test]
fn test_worker_inputs_round_trip() {
    let env = TestEnv::new();
    let root = chain_fused_plan(&env);
    let operator = env.planner().compile(&root).unwrap();

    let inputs = operator.join_inputs().unwrap();
    for input in inputs {
        let json = serde_json::to_string(input).unwrap();
        let decoded: JoinInput = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, input);
    }
    let partitioned = operator.as_partitioned_join().unwrap();
    for partition in partitioned
        .small_partition_inputs
        .iter()
        .chain(&partitioned.large_partition_inputs)
    {
        let json = serde_json::to_string(partition).unwrap();
        let decoded: crate::plan::physical::PartitionInput = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, partition);
    }
}

#[test]
fn test_partition_projection_covers_join_and_filter_columns() {
    let env = TestEnv::new();
    env.add_base_table("p", &["pk", "px", "pf", "pz"], 4, 2);
    env.add_base_table("q", &["qk", "qv"], 4, 2);
    env.advisor.set_partitions("p", "q", 4);

    // The join keeps pk and px; the filter needs pf; pz is dead weight.
    let left = Table::Base(
        BaseTable::new(
            SCHEMA,
            "p",
            vec!["pk".into(), "px".into(), "pf".into(), "pz".into()],
            TableScanFilter::new(
                SCHEMA,
                "p",
                Predicate::Compare {
                    column_id: 2,
                    op: CompareOp::Lt,
                    value: Scalar::Long(10),
                },
            ),
        )
        .unwrap(),
    );
    let right = base_table("q", &["qk", "qv"], false);
    let join = Join::new(
        left,
        right,
        vec![0],
        vec![0],
        vec![true, true, false, false],
        vec![true, true],
        vec!["pk".into(), "px".into()],
        vec!["qk".into(), "qv".into()],
        JoinType::Inner,
        JoinAlgorithm::Partitioned,
        JoinEndian::SmallLeft,
    )
    .unwrap();
    let root = Table::Joined(JoinedTable::new(
        SCHEMA,
        "p_join_q",
        vec!["pk".into(), "px".into(), "qk".into(), "qv".into()],
        join,
    ));

    let operator = env.planner().compile(&root).unwrap();
    let op = operator.as_partitioned_join().unwrap();

    let left_partition = &op.small_partition_inputs[0];
    // Partition projection is the join projection plus the filter column;
    // it strictly contains the join projection.
    assert_eq!(left_partition.projection, vec![true, true, true, false]);
    // The partition worker still scans every column.
    assert_eq!(
        left_partition.table_info.columns_to_read,
        vec!["pk".to_owned(), "px".to_owned(), "pf".to_owned(), "pz".to_owned()]
    );

    let input = op.inputs[0].as_partitioned().unwrap();
    // The joiner reads only the partitioned columns, with rewritten ids.
    assert_eq!(
        input.small_table.columns_to_read,
        vec!["pk".to_owned(), "px".to_owned(), "pf".to_owned()]
    );
    assert_eq!(input.small_table.key_column_ids, vec![0]);
    // The filter-only column drops out of the rewritten join projection.
    assert_eq!(input.join_info.small_projection, vec![true, true, false]);
}

#[test]
fn test_aggregation_reuses_join_compilation() {
    use pixels_common::{Scheme, StorageInfo};

    use crate::plan::{AggregatedTable, Aggregation, FunctionType, OutputEndpoint};

    let env = TestEnv::new();
    env.add_base_table("a", &["k", "v"], 4, 2);
    env.add_base_table("b", &["k", "w"], 8, 2);
    let joined = || {
        join_all(
            "t_ab",
            base_table("a", &["k", "v"], true),
            base_table("b", &["k", "w"], true),
            JoinAlgorithm::Broadcast,
            JoinEndian::SmallLeft,
        )
    };

    let join_only = env.planner().compile(&joined()).unwrap();

    let aggregation = Aggregation::new(
        joined(),
        vec![0],
        vec!["gk".to_owned()],
        vec![true],
        vec![3],
        vec!["sw".to_owned()],
        vec!["bigint".to_owned()],
        vec![FunctionType::Sum],
        OutputEndpoint {
            path: "/out/".to_owned(),
            storage: StorageInfo::from_scheme(Scheme::S3),
        },
    )
    .unwrap();
    let root = Table::Aggregated(AggregatedTable::new(
        SCHEMA,
        "agg_t",
        vec!["gk".to_owned(), "sw".to_owned()],
        aggregation,
    ));
    let operator = env.planner().compile(&root).unwrap();
    let agg_op = operator.as_aggregation().unwrap();
    let child = agg_op.child.as_deref().unwrap();

    let plain = join_only.join_inputs().unwrap();
    let rerouted = child.join_inputs().unwrap();
    assert_eq!(plain.len(), rerouted.len());
    for (plain, rerouted) in plain.iter().zip(rerouted) {
        let plain = plain.as_broadcast().unwrap();
        let rerouted = rerouted.as_broadcast().unwrap();
        // Same join, same inputs.
        assert_eq!(plain.small_table, rerouted.small_table);
        assert_eq!(plain.large_table, rerouted.large_table);
        assert_eq!(plain.join_info, rerouted.join_info);
        // Only the partial aggregation and the rerouted output differ.
        assert!(rerouted.partial_aggregation_present);
        assert!(rerouted.partial_aggregation_info.is_some());
        assert!(rerouted.output.path.ends_with("/agg_t/"));
        assert_eq!(rerouted.output.file_names.len(), 1);
    }
}

#[test]
fn test_filter_wire_format() {
    let filter = TableScanFilter::new(
        SCHEMA,
        "r",
        Predicate::Compare {
            column_id: 0,
            op: CompareOp::Gt,
            value: Scalar::Long(5),
        },
    );
    let expected = expect![[
        r#"{"schemaName":"test","tableName":"r","predicate":{"kind":"compare","columnId":0,"op":"GT","value":5}}"#
    ]];
    expected.assert_eq(&filter.to_json());
}
