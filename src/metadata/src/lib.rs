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

//! Read-only view of the metadata catalog consumed by the planner: table
//! layouts, column statistics, and the split/projection indices derived from
//! them.

pub mod error;
pub mod index;
pub mod layout;
pub mod service;

pub use error::{MetadataError, MetadataResult};
pub use layout::{
    Column, Layout, Order, ProjectionPattern, Projections, SchemaTableName, SplitPattern, Splits,
};
pub use service::MetadataService;
