// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-disk layout under the data directory.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DATA_DIR;

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key database holding encrypted Ed25519 secrets.
    pub fn keys_db(&self) -> PathBuf {
        self.root.join("keys").join("keys.redb")
    }

    /// Device key file. Created with owner-only permissions.
    pub fn device_key(&self) -> PathBuf {
        self.root.join("device").join("storage.key")
    }
}
