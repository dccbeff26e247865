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

//! The logical plan IR the compiler consumes and the physical worker-input
//! descriptors it produces.

mod aggregation;
mod filter;
mod join;
pub mod physical;
mod table;

pub use aggregation::{Aggregation, FunctionType, OutputEndpoint};
pub use filter::{CompareOp, Predicate, Scalar, TableScanFilter};
pub use join::{Join, JoinAlgorithm, JoinEndian, JoinType};
pub use table::{AggregatedTable, BaseTable, JoinedTable, Table};
