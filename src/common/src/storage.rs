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

use parse_display::{Display as ParseDisplay, FromStr as ParseFromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to list paths under {prefix}: {source}")]
    ListPaths {
        prefix: String,
        #[source]
        source: anyhow::Error,
    },
}

/// The storage system a path lives on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    ParseDisplay,
    ParseFromStr,
    Serialize,
    Deserialize,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    S3,
    Minio,
    Redis,
    Local,
    Hdfs,
}

/// Endpoint and credentials needed by a worker to open a storage scheme.
///
/// The planner itself never dials storage endpoints; it only stamps this into
/// the worker-input descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub scheme: Scheme,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl StorageInfo {
    /// Storage info carrying only the scheme; endpoint and credentials are
    /// resolved by the worker runtime from its own environment.
    pub fn from_scheme(scheme: Scheme) -> Self {
        Self {
            scheme,
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }

    pub fn new(
        scheme: Scheme,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            scheme,
            endpoint: Some(endpoint.into()),
            access_key: Some(access_key.into()),
            secret_key: Some(secret_key.into()),
        }
    }
}

/// Synchronous boundary to the object storage the engine reads and writes.
pub trait Storage: Send + Sync {
    /// Lists the file paths under a prefix. Order is unspecified; callers that
    /// need determinism must sort.
    fn list_paths(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Joins two path components with exactly one `/` between them.
pub fn concat_path(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    format!("{base}/{tail}")
}

/// Normalizes a directory path to end with exactly one `/`.
pub fn ensure_trailing_slash(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}
