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

use crate::plan::{JoinEndian, Table};

/// Statistics-driven advice consumed by the compiler.
///
/// Implementations typically sit on top of the metadata catalog's table
/// statistics; the compiler only ever reads from the advisor.
pub trait JoinAdvisor: Send + Sync {
    /// The hash fan-out a partitioned join of these two tables should use.
    fn num_partitions(&self, left: &Table, right: &Table, endian: JoinEndian) -> usize;

    /// Fraction of a table's rows that pass its filters; negative when
    /// unknown.
    fn table_selectivity(&self, table: &Table) -> f64;
}
