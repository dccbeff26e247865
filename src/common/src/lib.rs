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

//! Primitives shared by the planner crates: typed configuration, storage
//! schemes and slash-safe path handling.

pub mod config;
pub mod storage;

pub use config::{ConfigError, ConfigResult, PlannerConfig, SplitsIndexType};
pub use storage::{
    concat_path, ensure_trailing_slash, Scheme, Storage, StorageError, StorageInfo, StorageResult,
};
