use crate::StoreError;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Schema version of the persisted layout. Bumped whenever the key schema or
/// a record encoding changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

const VERSION_FILE: &str = "version.json";

/// Policy applied when opening a database directory that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WithExisting {
    /// Open the existing data as-is.
    #[default]
    Trust,
    /// Refuse to open when the sentinel disagrees with the chain.
    Verify,
    /// Open and run a database rescue.
    Rescue,
    /// Destroy the existing data and start fresh.
    Kill,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct VersionInfo {
    version: u32,
    genesis: B256,
}

/// Outcome of comparing the on-disk sentinel with the running chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    /// No sentinel present; the directory is fresh.
    Fresh,
    /// Sentinel matches the schema version and genesis hash.
    Matches,
    /// Sentinel disagrees with the schema version or the genesis hash.
    Mismatch,
}

/// Reads the sentinel under `dir` and compares it against the expected
/// genesis hash and [`SCHEMA_VERSION`].
pub fn check_version(dir: &Path, genesis: B256) -> Result<VersionStatus, StoreError> {
    let path = dir.join(VERSION_FILE);
    if !path.exists() {
        return Ok(VersionStatus::Fresh)
    }
    let raw = fs::read_to_string(&path).map_err(|err| StoreError::Version(err.to_string()))?;
    let info: VersionInfo =
        serde_json::from_str(&raw).map_err(|err| StoreError::Version(err.to_string()))?;
    if info.version == SCHEMA_VERSION && info.genesis == genesis {
        Ok(VersionStatus::Matches)
    } else {
        Ok(VersionStatus::Mismatch)
    }
}

/// Writes the sentinel for the given genesis hash under `dir`.
pub fn write_version(dir: &Path, genesis: B256) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|err| StoreError::Version(err.to_string()))?;
    let info = VersionInfo { version: SCHEMA_VERSION, genesis };
    let raw = serde_json::to_string_pretty(&info)
        .map_err(|err| StoreError::Version(err.to_string()))?;
    fs::write(dir.join(VERSION_FILE), raw).map_err(|err| StoreError::Version(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_then_match_then_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = B256::repeat_byte(0x42);

        assert_eq!(check_version(dir.path(), genesis).unwrap(), VersionStatus::Fresh);

        write_version(dir.path(), genesis).unwrap();
        assert_eq!(check_version(dir.path(), genesis).unwrap(), VersionStatus::Matches);

        let other = B256::repeat_byte(0x43);
        assert_eq!(check_version(dir.path(), other).unwrap(), VersionStatus::Mismatch);
    }
}
