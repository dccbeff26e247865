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

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use parse_display::{Display as ParseDisplay, FromStr as ParseFromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{ensure_trailing_slash, Scheme};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value {value:?} for config key {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
            reason: reason.into(),
        }
    }
}

/// How the split size of a table layout is decided when no fixed split size
/// is configured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, ParseDisplay, ParseFromStr, Serialize, Deserialize,
)]
#[display(style = "SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitsIndexType {
    /// Exact-match lookup over the split patterns pre-computed for the layout.
    Inverted,
    /// Split size derived from column statistics in the metadata catalog.
    CostBased,
}

/// Typed view over the planner's configuration properties.
///
/// The recognized keys are exhaustive for the plan compiler; unknown keys are
/// ignored so that a full engine-wide properties file can be passed through
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// `executor.input.storage`: scheme of the storage holding base table data.
    pub input_storage: Scheme,
    /// `executor.intermediate.storage`: scheme for intermediate files.
    pub intermediate_storage: Scheme,
    /// `executor.intermediate.folder`: root of intermediate paths, always with
    /// a trailing slash.
    pub intermediate_folder: String,
    /// `executor.intra.worker.parallelism`: input splits processed by one
    /// worker invocation.
    pub intra_worker_parallelism: usize,
    /// `aggregation.pre-aggregate.threshold`: producer count above which a
    /// pre-aggregation stage is inserted.
    pub pre_aggr_threshold: usize,
    /// `aggregation.compute.final.in.server`.
    pub compute_final_aggr_in_server: bool,
    /// `fixed.split.size`: 0 means the splits index decides.
    pub fixed_split_size: usize,
    /// `projection.read.enabled`.
    pub projection_read_enabled: bool,
    /// `splits.index.type`.
    pub splits_index_type: SplitsIndexType,
    /// `metadata.server.host`.
    pub metadata_host: String,
    /// `metadata.server.port`.
    pub metadata_port: u16,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            input_storage: Scheme::S3,
            intermediate_storage: Scheme::S3,
            intermediate_folder: "/pixels-turbo/intermediate/".to_owned(),
            intra_worker_parallelism: 8,
            pre_aggr_threshold: 16,
            compute_final_aggr_in_server: false,
            fixed_split_size: 0,
            projection_read_enabled: false,
            splits_index_type: SplitsIndexType::Inverted,
            metadata_host: "localhost".to_owned(),
            metadata_port: 18888,
        }
    }
}

impl PlannerConfig {
    /// Builds a config from a properties-style key/value map, starting from
    /// the defaults.
    pub fn from_properties(props: &BTreeMap<String, String>) -> ConfigResult<Self> {
        let mut config = Self::default();
        for (key, value) in props {
            match key.as_str() {
                "executor.input.storage" => config.input_storage = parse(key, value)?,
                "executor.intermediate.storage" => config.intermediate_storage = parse(key, value)?,
                "executor.intermediate.folder" => {
                    config.intermediate_folder = ensure_trailing_slash(value);
                }
                "executor.intra.worker.parallelism" => {
                    config.intra_worker_parallelism = parse_positive(key, value)?;
                }
                "aggregation.pre-aggregate.threshold" => {
                    config.pre_aggr_threshold = parse_positive(key, value)?;
                }
                "aggregation.compute.final.in.server" => {
                    config.compute_final_aggr_in_server = parse(key, value)?;
                }
                "fixed.split.size" => config.fixed_split_size = parse(key, value)?,
                "projection.read.enabled" => config.projection_read_enabled = parse(key, value)?,
                "splits.index.type" => config.splits_index_type = parse(key, value)?,
                "metadata.server.host" => config.metadata_host = value.clone(),
                "metadata.server.port" => config.metadata_port = parse(key, value)?,
                _ => {
                    tracing::debug!(key = %key, "ignoring config key not recognized by the planner");
                }
            }
        }
        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, value, e.to_string()))
}

fn parse_positive(key: &str, value: &str) -> ConfigResult<usize> {
    let parsed: usize = parse(key, value)?;
    if parsed == 0 {
        return Err(ConfigError::invalid(key, value, "must be positive"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn props(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_properties() {
        let config = PlannerConfig::from_properties(&props(&[
            ("executor.input.storage", "minio"),
            ("executor.intermediate.storage", "redis"),
            ("executor.intermediate.folder", "/tmp/intermediate"),
            ("executor.intra.worker.parallelism", "4"),
            ("aggregation.pre-aggregate.threshold", "5"),
            ("aggregation.compute.final.in.server", "true"),
            ("fixed.split.size", "16"),
            ("projection.read.enabled", "true"),
            ("splits.index.type", "COST_BASED"),
            ("metadata.server.host", "meta.example.com"),
            ("metadata.server.port", "18890"),
            ("some.other.subsystem.key", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.input_storage, Scheme::Minio);
        assert_eq!(config.intermediate_storage, Scheme::Redis);
        // The trailing slash is enforced.
        assert_eq!(config.intermediate_folder, "/tmp/intermediate/");
        assert_eq!(config.intra_worker_parallelism, 4);
        assert_eq!(config.pre_aggr_threshold, 5);
        assert!(config.compute_final_aggr_in_server);
        assert_eq!(config.fixed_split_size, 16);
        assert!(config.projection_read_enabled);
        assert_eq!(config.splits_index_type, SplitsIndexType::CostBased);
        assert_eq!(config.metadata_host, "meta.example.com");
        assert_eq!(config.metadata_port, 18890);
    }

    #[test]
    fn test_invalid_values() {
        PlannerConfig::from_properties(&props(&[("executor.intra.worker.parallelism", "0")]))
            .unwrap_err();
        PlannerConfig::from_properties(&props(&[("fixed.split.size", "-1")])).unwrap_err();
        PlannerConfig::from_properties(&props(&[("splits.index.type", "BTREE")])).unwrap_err();
        PlannerConfig::from_properties(&props(&[("executor.input.storage", "ftp")])).unwrap_err();
    }

    #[test]
    fn test_splits_index_type_round_trip() {
        assert_eq!(SplitsIndexType::CostBased.to_string(), "COST_BASED");
        assert_eq!(
            "INVERTED".parse::<SplitsIndexType>().unwrap(),
            SplitsIndexType::Inverted
        );
    }
}
