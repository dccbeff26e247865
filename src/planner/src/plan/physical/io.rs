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

use pixels_common::{concat_path, StorageInfo};
use serde::{Deserialize, Serialize};

/// A contiguous slice of row groups in one columnar file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputInfo {
    pub path: String,
    pub start_row_group_index: i32,
    /// `-1` reads to the end of the file.
    pub row_group_count: i32,
}

impl InputInfo {
    pub fn new(path: impl Into<String>, start_row_group_index: i32, row_group_count: i32) -> Self {
        Self {
            path: path.into(),
            start_row_group_index,
            row_group_count,
        }
    }

    /// An input covering a whole file.
    pub fn whole_file(path: impl Into<String>) -> Self {
        Self::new(path, 0, -1)
    }
}

/// The unit of work read by one worker-thread slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSplit {
    pub input_infos: Vec<InputInfo>,
}

impl InputSplit {
    pub fn new(input_infos: Vec<InputInfo>) -> Self {
        Self { input_infos }
    }

    pub fn single(input_info: InputInfo) -> Self {
        Self::new(vec![input_info])
    }
}

/// A single output file of a worker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputInfo {
    pub path: String,
    pub storage_info: StorageInfo,
    pub encoding: bool,
}

/// A set of output files sharing one base folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiOutputInfo {
    /// Base folder, with a trailing slash.
    pub path: String,
    pub storage_info: StorageInfo,
    pub encoding: bool,
    pub file_names: Vec<String>,
}

impl MultiOutputInfo {
    /// Full paths of the files this output produces, in order.
    pub fn file_paths(&self) -> Vec<String> {
        self.file_names
            .iter()
            .map(|name| concat_path(&self.path, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use pixels_common::Scheme;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_file_paths_single_slash() {
        let output = MultiOutputInfo {
            path: "/intermediate/42/s/t/".to_owned(),
            storage_info: StorageInfo::from_scheme(Scheme::S3),
            encoding: true,
            file_names: vec!["0/join".to_owned(), "1/join".to_owned()],
        };
        assert_eq!(
            output.file_paths(),
            vec!["/intermediate/42/s/t/0/join", "/intermediate/42/s/t/1/join"]
        );
    }

    #[test]
    fn test_input_info_serialized_field_names() {
        let json = serde_json::to_string(&InputInfo::new("/a/b", 8, 4)).unwrap();
        assert_eq!(
            json,
            r#"{"path":"/a/b","startRowGroupIndex":8,"rowGroupCount":4}"#
        );
    }
}
