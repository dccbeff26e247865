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

use thiserror::Error;

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata service unavailable: {0}")]
    Unavailable(#[source] anyhow::Error),
    #[error("malformed {document} document of table {table}: {source}")]
    Malformed {
        table: String,
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
