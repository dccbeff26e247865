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

//! The aggregation compiler: partial-aggregation producers, an optional
//! pre-aggregation stage, and the final aggregation worker.

use pixels_common::concat_path;

use crate::error::{PlannerError, PlannerResult};
use crate::operator::{AggregationOperator, Operator};
use crate::plan::physical::{
    AggregatedTableInfo, AggregationInfo, AggregationInput, MultiOutputInfo, OutputInfo,
    PartialAggregationInfo, ScanInput, ScanTableInfo,
};
use crate::plan::{AggregatedTable, Aggregation, Table};
use crate::Planner;

impl Planner {
    pub(crate) fn compile_aggregation(&self, table: &AggregatedTable) -> PlannerResult<Operator> {
        let aggregation = &table.aggregation;
        let folder = self.table_folder(&table.schema_name, &table.table_name);
        let partial_info = partial_aggregation_info(aggregation);

        // The producer count decides whether a pre-aggregation stage exists,
        // which in turn decides where the partial files land.
        let (producer_batches, child) = match &*aggregation.origin_table {
            Table::Base(_) => {
                let splits = self.input_splits(&aggregation.origin_table)?;
                let batches: Vec<_> = splits
                    .chunks(self.config.intra_worker_parallelism)
                    .map(<[_]>::to_vec)
                    .collect();
                (Some(batches), None)
            }
            Table::Joined(joined) => {
                let child = self.compile_join(joined, None)?;
                if child.join_inputs().is_none() {
                    return Err(PlannerError::invalid_plan(format!(
                        "aggregation over {} reads a join that produced no submittable inputs",
                        table.table_name
                    )));
                }
                (None, Some(child))
            }
            Table::Aggregated(origin) => {
                return Err(PlannerError::invalid_plan(format!(
                    "aggregation over aggregated table {} is not supported",
                    origin.table_name
                )));
            }
        };
        let num_producers = match (&producer_batches, &child) {
            (Some(batches), _) => batches.len(),
            (None, Some(child)) => child.join_inputs().map_or(0, <[_]>::len),
            (None, None) => 0,
        };
        let pre_aggregate = num_producers > self.config.pre_aggr_threshold;
        let partial_storage = if self.config.compute_final_aggr_in_server && !pre_aggregate {
            aggregation.output_endpoint.storage.clone()
        } else {
            self.intermediate_storage()
        };

        let mut scan_inputs = Vec::new();
        let mut partial_files = Vec::new();
        let mut child = child;
        match (&producer_batches, &mut child) {
            (Some(batches), _) => {
                let base = aggregation
                    .origin_table
                    .as_base()
                    .expect("producer batches imply a base origin");
                for (output_id, batch) in batches.iter().enumerate() {
                    let path = concat_path(&folder, &format!("{output_id}/partial_aggr"));
                    scan_inputs.push(ScanInput {
                        query_id: self.query_id,
                        table_info: ScanTableInfo {
                            table_name: base.table_name.clone(),
                            base: true,
                            columns_to_read: base.column_names.clone(),
                            input_splits: batch.clone(),
                            filter: base.filter.to_json(),
                            storage_info: self.input_storage(),
                        },
                        scan_projection: vec![true; base.column_names.len()],
                        partial_aggregation_present: true,
                        partial_aggregation_info: Some(partial_info.clone()),
                        output: OutputInfo {
                            path: path.clone(),
                            storage_info: partial_storage.clone(),
                            encoding: true,
                        },
                    });
                    partial_files.push(path);
                }
            }
            (None, Some(child)) => {
                // The join workers fold their results through the partial
                // aggregation and their outputs are rerouted under the
                // aggregated table.
                let inputs = child
                    .join_inputs_mut()
                    .expect("checked to be ready above");
                for (output_id, input) in inputs.iter_mut().enumerate() {
                    let file_name = format!("partial_aggr_{output_id}");
                    partial_files.push(concat_path(&folder, &file_name));
                    input.set_output(MultiOutputInfo {
                        path: folder.clone(),
                        storage_info: partial_storage.clone(),
                        encoding: true,
                        file_names: vec![file_name],
                    });
                    input.attach_partial_aggregation(partial_info.clone());
                }
            }
            (None, None) => unreachable!("origin is base or joined"),
        }

        let num_group_keys = aggregation.group_key_column_ids.len();
        let num_aggregates = aggregation.aggregate_column_ids.len();
        // In a partial file the group keys come first, then the partial
        // results.
        let partial_group_key_ids: Vec<usize> = (0..num_group_keys).collect();
        let partial_aggregate_ids: Vec<usize> =
            (num_group_keys..num_group_keys + num_aggregates).collect();
        let partial_columns: Vec<String> = aggregation
            .group_key_column_alias
            .iter()
            .chain(&aggregation.result_column_alias)
            .cloned()
            .collect();

        let mut pre_aggr_inputs = Vec::new();
        let (final_files, final_files_storage) = if pre_aggregate {
            let mut surviving = Vec::new();
            for (output_id, chunk) in partial_files
                .chunks(self.config.pre_aggr_threshold)
                .enumerate()
            {
                let path = concat_path(&folder, &format!("{output_id}/pre_aggr"));
                pre_aggr_inputs.push(AggregationInput {
                    query_id: self.query_id,
                    aggregated_table_info: AggregatedTableInfo {
                        table_name: table.table_name.clone(),
                        base: false,
                        columns_to_read: partial_columns.clone(),
                        input_files: chunk.to_vec(),
                        parallelism: self.config.intra_worker_parallelism,
                        storage_info: partial_storage.clone(),
                    },
                    aggregation_info: AggregationInfo {
                        group_key_column_alias: aggregation.group_key_column_alias.clone(),
                        // Intermediate stages keep every group key.
                        group_key_column_projection: vec![true; num_group_keys],
                        group_key_column_ids: partial_group_key_ids.clone(),
                        aggregate_column_ids: partial_aggregate_ids.clone(),
                        result_column_alias: aggregation.result_column_alias.clone(),
                        result_column_types: aggregation.result_column_types.clone(),
                        function_types: aggregation.function_types.clone(),
                    },
                    output: OutputInfo {
                        path: path.clone(),
                        storage_info: self.intermediate_storage(),
                        encoding: true,
                    },
                });
                surviving.push(path);
            }
            (surviving, self.intermediate_storage())
        } else {
            (partial_files, partial_storage)
        };

        let final_input = AggregationInput {
            query_id: self.query_id,
            aggregated_table_info: AggregatedTableInfo {
                table_name: table.table_name.clone(),
                base: false,
                columns_to_read: partial_columns,
                input_files: final_files,
                parallelism: self.config.intra_worker_parallelism,
                storage_info: final_files_storage,
            },
            aggregation_info: AggregationInfo {
                group_key_column_alias: aggregation.group_key_column_alias.clone(),
                group_key_column_projection: aggregation.group_key_column_projection.clone(),
                group_key_column_ids: partial_group_key_ids,
                aggregate_column_ids: partial_aggregate_ids,
                result_column_alias: aggregation.result_column_alias.clone(),
                result_column_types: aggregation.result_column_types.clone(),
                function_types: aggregation.function_types.clone(),
            },
            output: OutputInfo {
                path: concat_path(&aggregation.output_endpoint.path, "final_aggr"),
                storage_info: aggregation.output_endpoint.storage.clone(),
                encoding: true,
            },
        };

        Ok(Operator::Aggregation(AggregationOperator {
            name: format!("{}.{}", table.schema_name, table.table_name),
            scan_inputs,
            pre_aggr_inputs,
            final_input,
            child: child.map(Box::new),
        }))
    }
}

/// The partial aggregation attached to the producers; its column ids refer
/// to the origin table's columns.
fn partial_aggregation_info(aggregation: &Aggregation) -> PartialAggregationInfo {
    PartialAggregationInfo {
        group_key_column_alias: aggregation.group_key_column_alias.clone(),
        group_key_column_ids: aggregation.group_key_column_ids.clone(),
        aggregate_column_ids: aggregation.aggregate_column_ids.clone(),
        result_column_alias: aggregation.result_column_alias.clone(),
        result_column_types: aggregation.result_column_types.clone(),
        function_types: aggregation.function_types.clone(),
    }
}
