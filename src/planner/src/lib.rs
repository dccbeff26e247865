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

//! The plan compiler of the serverless execution layer.
//!
//! Given a root logical table (joined or aggregated), [`Planner::compile`]
//! produces the operator tree whose worker inputs are submitted to the
//! function-as-a-service runtime, with intermediate files on object storage
//! as the data-flow edges between them.

use std::sync::Arc;

use pixels_common::{concat_path, ensure_trailing_slash, PlannerConfig, Storage, StorageInfo};
use pixels_metadata::index::IndexFactory;
use pixels_metadata::MetadataService;

pub mod advisor;
pub mod error;
pub mod operator;
pub mod plan;

mod aggregation;
mod join;
mod splits;

#[cfg(test)]
mod tests;

pub use advisor::JoinAdvisor;
pub use error::{PlannerError, PlannerResult};
pub use operator::{
    AggregationOperator, JoinInputs, Operator, PartitionedJoinOperator, SingleStageJoinOperator,
};

use crate::plan::Table;

/// Compiles one query's root table into an operator tree.
///
/// The compiler is a pure function over the plan and its collaborator
/// handles: it holds no global state, performs no retries, and two
/// compilations of the same input yield identical operator trees.
pub struct Planner {
    query_id: u64,
    config: Arc<PlannerConfig>,
    metadata: Arc<dyn MetadataService>,
    storage: Arc<dyn Storage>,
    indexes: Arc<IndexFactory>,
    advisor: Arc<dyn JoinAdvisor>,
}

impl Planner {
    pub fn new(
        query_id: u64,
        config: Arc<PlannerConfig>,
        metadata: Arc<dyn MetadataService>,
        storage: Arc<dyn Storage>,
        indexes: Arc<IndexFactory>,
        advisor: Arc<dyn JoinAdvisor>,
    ) -> Self {
        Self {
            query_id,
            config,
            metadata,
            storage,
            indexes,
            advisor,
        }
    }

    /// Compiles the root table. The returned operator's worker inputs, and
    /// those of its children, are ordered as they must be submitted.
    pub fn compile(&self, root: &Table) -> PlannerResult<Operator> {
        tracing::debug!(query_id = self.query_id, root = %root.name(), "compiling plan");
        let operator = match root {
            Table::Joined(joined) => self.compile_join(joined, None)?,
            Table::Aggregated(aggregated) => self.compile_aggregation(aggregated)?,
            Table::Base(base) => {
                return Err(PlannerError::invalid_plan(format!(
                    "root table {} is a base table; the root must be joined or aggregated",
                    base.table_name
                )));
            }
        };
        if operator.has_pending_chain() {
            return Err(PlannerError::invalid_plan(format!(
                "incomplete chain join surfaced at the root of {}",
                root.table_name()
            )));
        }
        Ok(operator)
    }

    /// `<intermediateRoot>/<queryId>/<schema>/<table>/`.
    pub(crate) fn table_folder(&self, schema_name: &str, table_name: &str) -> String {
        let folder = concat_path(&self.config.intermediate_folder, &self.query_id.to_string());
        let folder = concat_path(&folder, schema_name);
        ensure_trailing_slash(&concat_path(&folder, table_name))
    }

    pub(crate) fn input_storage(&self) -> StorageInfo {
        StorageInfo::from_scheme(self.config.input_storage)
    }

    pub(crate) fn intermediate_storage(&self) -> StorageInfo {
        StorageInfo::from_scheme(self.config.intermediate_storage)
    }
}
