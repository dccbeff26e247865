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

use crate::error::{PlannerError, PlannerResult};
use crate::plan::table::Table;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    EquiLeft,
    EquiRight,
    EquiFull,
}

impl JoinType {
    /// The join type after swapping the two sides.
    pub fn flip(self) -> Self {
        match self {
            Self::Inner => Self::Inner,
            Self::EquiLeft => Self::EquiRight,
            Self::EquiRight => Self::EquiLeft,
            Self::EquiFull => Self::EquiFull,
        }
    }

    /// Whether a partitioned join of this type spills an extra left-outer
    /// tail file per partition.
    pub fn writes_left_tail(self) -> bool {
        matches!(self, Self::EquiLeft | Self::EquiFull)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinAlgorithm {
    Broadcast,
    Partitioned,
    BroadcastChain,
    PartitionedChain,
}

/// Which side of the join holds the smaller table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinEndian {
    SmallLeft,
    LargeLeft,
}

/// An equi-join between two tables.
///
/// The projections are bitmasks over the respective child's columns; the
/// alias lists name exactly the projected columns, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub left: Box<Table>,
    pub right: Box<Table>,
    pub left_key_column_ids: Vec<usize>,
    pub right_key_column_ids: Vec<usize>,
    pub left_projection: Vec<bool>,
    pub right_projection: Vec<bool>,
    pub left_column_alias: Vec<String>,
    pub right_column_alias: Vec<String>,
    pub join_type: JoinType,
    pub join_algo: JoinAlgorithm,
    pub join_endian: JoinEndian,
}

#[allow(clippy::too_many_arguments)]
impl Join {
    pub fn new(
        left: Table,
        right: Table,
        left_key_column_ids: Vec<usize>,
        right_key_column_ids: Vec<usize>,
        left_projection: Vec<bool>,
        right_projection: Vec<bool>,
        left_column_alias: Vec<String>,
        right_column_alias: Vec<String>,
        join_type: JoinType,
        join_algo: JoinAlgorithm,
        join_endian: JoinEndian,
    ) -> PlannerResult<Self> {
        let describe = || format!("{} with {}", left.table_name(), right.table_name());
        if left_key_column_ids.is_empty() || left_key_column_ids.len() != right_key_column_ids.len()
        {
            return Err(PlannerError::invalid_plan(format!(
                "join of {} has mismatched key columns",
                describe()
            )));
        }
        if left_projection.len() != left.column_names().len()
            || right_projection.len() != right.column_names().len()
        {
            return Err(PlannerError::invalid_plan(format!(
                "join of {} has projections not covering its children",
                describe()
            )));
        }
        if left_column_alias.len() != left_projection.iter().filter(|kept| **kept).count()
            || right_column_alias.len() != right_projection.iter().filter(|kept| **kept).count()
        {
            return Err(PlannerError::invalid_plan(format!(
                "join of {} aliases a different number of columns than it projects",
                describe()
            )));
        }
        if right.is_joined() && !left.is_joined() {
            // A single-pipeline join always keeps its base table on the right.
            return Err(PlannerError::invalid_plan(format!(
                "join of {} has a joined right child under a non-joined left child",
                describe()
            )));
        }
        if left.is_joined() && right.is_joined() && join_endian != JoinEndian::SmallLeft {
            return Err(PlannerError::invalid_plan(format!(
                "multi-pipeline join of {} must be small-left",
                describe()
            )));
        }
        if matches!(join_type, JoinType::EquiLeft | JoinType::EquiFull)
            && join_algo == JoinAlgorithm::Broadcast
        {
            return Err(PlannerError::invalid_plan(format!(
                "left/full outer join of {} cannot be broadcast",
                describe()
            )));
        }
        Ok(Self {
            left: Box::new(left),
            right: Box::new(right),
            left_key_column_ids,
            right_key_column_ids,
            left_projection,
            right_projection,
            left_column_alias,
            right_column_alias,
            join_type,
            join_algo,
            join_endian,
        })
    }

    pub fn is_multi_pipeline(&self) -> bool {
        self.left.is_joined() && self.right.is_joined()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::PlannerError;
    use crate::plan::table::BaseTable;
    use crate::plan::TableScanFilter;

    fn base(name: &str, columns: &[&str]) -> Table {
        Table::Base(
            BaseTable::new(
                "test",
                name,
                columns.iter().map(|c| c.to_string()).collect(),
                TableScanFilter::none("test", name),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_join_type_flip() {
        assert_eq!(JoinType::EquiLeft.flip(), JoinType::EquiRight);
        assert_eq!(JoinType::EquiFull.flip(), JoinType::EquiFull);
        assert_eq!(JoinType::Inner.flip(), JoinType::Inner);
    }

    #[test]
    fn test_outer_broadcast_rejected() {
        let err = Join::new(
            base("a", &["x", "y"]),
            base("b", &["z"]),
            vec![0],
            vec![0],
            vec![true, true],
            vec![true],
            vec!["x".to_owned(), "y".to_owned()],
            vec!["z".to_owned()],
            JoinType::EquiLeft,
            JoinAlgorithm::Broadcast,
            JoinEndian::SmallLeft,
        )
        .unwrap_err();
        assert_matches!(err, PlannerError::InvalidPlan(_));
    }

    #[test]
    fn test_alias_projection_mismatch_rejected() {
        let err = Join::new(
            base("a", &["x", "y"]),
            base("b", &["z"]),
            vec![0],
            vec![0],
            vec![true, false],
            vec![true],
            vec!["x".to_owned(), "y".to_owned()],
            vec!["z".to_owned()],
            JoinType::Inner,
            JoinAlgorithm::Broadcast,
            JoinEndian::SmallLeft,
        )
        .unwrap_err();
        assert_matches!(err, PlannerError::InvalidPlan(_));
    }
}
