pub mod config;
pub mod routes;

pub use config::ConfigStore;
pub use routes::{RouteStore, SavedRoute};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "ghostrun";
const DATA_DIR: &str = "data";

/// Directory holding saved routes and the stored config
///
/// A `data/` directory next to the executable wins (portable installs), then
/// the platform config dir, then `~/.ghostrun/data`, then `./data`.
pub fn app_data_dir() -> PathBuf {
    let portable = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DATA_DIR)))
        .filter(|dir| dir.is_dir());

    portable
        .or_else(|| dirs::config_dir().map(|p| p.join(APP_DIR).join(DATA_DIR)))
        .or_else(|| dirs::home_dir().map(|p| p.join(format!(".{}", APP_DIR)).join(DATA_DIR)))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR))
}

/// Read a JSON file, `None` when it does not exist
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    let value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

/// Write pretty JSON through a temp file so readers never see half a file
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_json_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");

        assert_eq!(read_json::<BTreeMap<String, u32>>(&path).unwrap(), None);

        let value = BTreeMap::from([("a".to_string(), 1u32)]);
        write_json(&path, &value).unwrap();
        assert_eq!(read_json(&path).unwrap(), Some(value));
        assert!(!path.with_extension("json.tmp").exists());

        fs::write(&path, "{ nope").unwrap();
        assert!(read_json::<BTreeMap<String, u32>>(&path).is_err());
    }

    #[test]
    fn test_app_data_dir_is_named() {
        assert!(app_data_dir().ends_with(DATA_DIR));
    }
}
