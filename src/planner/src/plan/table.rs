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

use pixels_metadata::SchemaTableName;

use crate::error::{PlannerError, PlannerResult};
use crate::plan::aggregation::Aggregation;
use crate::plan::filter::TableScanFilter;
use crate::plan::join::Join;

/// A logical table in the plan tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Table {
    Base(BaseTable),
    Joined(JoinedTable),
    Aggregated(AggregatedTable),
}

impl Table {
    pub fn as_base(&self) -> Option<&BaseTable> {
        match self {
            Self::Base(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_joined(&self) -> Option<&JoinedTable> {
        match self {
            Self::Joined(table) => Some(table),
            _ => None,
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self, Self::Base(_))
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined(_))
    }

    pub fn schema_name(&self) -> &str {
        match self {
            Self::Base(t) => &t.schema_name,
            Self::Joined(t) => &t.schema_name,
            Self::Aggregated(t) => &t.schema_name,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            Self::Base(t) => &t.table_name,
            Self::Joined(t) => &t.table_name,
            Self::Aggregated(t) => &t.table_name,
        }
    }

    /// The columns this table exposes to its parent, in order.
    pub fn column_names(&self) -> &[String] {
        match self {
            Self::Base(t) => &t.column_names,
            Self::Joined(t) => &t.column_names,
            Self::Aggregated(t) => &t.column_names,
        }
    }

    pub fn name(&self) -> SchemaTableName {
        SchemaTableName::new(self.schema_name(), self.table_name())
    }
}

/// A table physically stored in the catalog. `column_names` holds exactly the
/// columns the plan reads, so it doubles as the scan's columns-to-read.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseTable {
    pub schema_name: String,
    pub table_name: String,
    pub column_names: Vec<String>,
    pub filter: TableScanFilter,
}

impl BaseTable {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
        filter: TableScanFilter,
    ) -> PlannerResult<Self> {
        let table = Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            column_names,
            filter,
        };
        // Catch filters referencing columns the scan does not read; the
        // bitset math downstream indexes by column id.
        let num_columns = table.column_names.len();
        let referenced = table.filter.referenced_columns_checked(num_columns);
        if referenced.is_none() {
            return Err(PlannerError::invalid_plan(format!(
                "filter of table {} references a column the scan does not read",
                table.table_name
            )));
        }
        Ok(table)
    }
}

/// The result of a join.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedTable {
    pub schema_name: String,
    pub table_name: String,
    /// Aliases of the joined output columns.
    pub column_names: Vec<String>,
    pub join: Join,
}

impl JoinedTable {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
        join: Join,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            column_names,
            join,
        }
    }
}

/// The result of an aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregatedTable {
    pub schema_name: String,
    pub table_name: String,
    /// Group-key aliases followed by aggregate result aliases.
    pub column_names: Vec<String>,
    pub aggregation: Aggregation,
}

impl AggregatedTable {
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        column_names: Vec<String>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            column_names,
            aggregation,
        }
    }
}
