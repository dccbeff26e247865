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

use crate::error::MetadataResult;
use crate::layout::{Column, Layout, SchemaTableName};

/// Synchronous boundary to the metadata catalog.
///
/// Implementations typically talk to the metadata server named by the
/// `metadata.server.host` / `metadata.server.port` configuration keys; tests
/// use an in-memory catalog.
pub trait MetadataService: Send + Sync {
    /// All layout versions of a table, oldest first.
    fn get_layouts(&self, table: &SchemaTableName) -> MetadataResult<Vec<Layout>>;

    /// Column statistics of a table, in layout column order.
    fn get_columns(&self, table: &SchemaTableName) -> MetadataResult<Vec<Column>>;
}
