use std::{fs, path::Path};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};

/// Reads a YAML document from disk.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
}

/// Writes a YAML document, creating missing parent directories.
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let content = serde_yaml::to_string(value)?;
    fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))
}
