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

use pixels_common::StorageError;
use pixels_metadata::MetadataError;
use thiserror::Error;

pub type PlannerResult<T> = Result<T, PlannerError>;

/// Errors of one compilation. All of them are fatal to the compilation at
/// hand; no partial operator tree is returned and no retries are attempted.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(#[source] anyhow::Error),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),
    #[error("malformed metadata: {0}")]
    MalformedMetadata(#[source] MetadataError),
}

impl PlannerError {
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }
}

impl From<MetadataError> for PlannerError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::Unavailable(source) => Self::MetadataUnavailable(source),
            e @ MetadataError::Malformed { .. } => Self::MalformedMetadata(e),
        }
    }
}

impl From<StorageError> for PlannerError {
    fn from(e: StorageError) -> Self {
        Self::StorageUnavailable(e)
    }
}
