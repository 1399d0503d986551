use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::diff::ParamSnapshot;

/// Everything captured around one editor session, as saved to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub plugin_path: String,
    pub plugin_name: String,
    pub initial_params: ParamSnapshot,
    pub new_params: ParamSnapshot,
    #[serde(default, with = "base64_opt")]
    pub initial_state: Option<Vec<u8>>,
    #[serde(default, with = "base64_opt")]
    pub new_state: Option<Vec<u8>>,
}

mod base64_opt {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&general_purpose::STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| {
                general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

pub fn write_raw_state(path: &Path, state: &[u8]) -> Result<()> {
    fs::write(path, state)
        .with_context(|| format!("Failed to write raw state to {}", path.display()))?;
    log::debug!("Wrote {} bytes of raw state to {:?}", state.len(), path);
    Ok(())
}

pub fn write_xml(path: &Path, xml: &str) -> Result<()> {
    fs::write(path, xml)
        .with_context(|| format!("Failed to write state XML to {}", path.display()))?;
    log::debug!("Wrote {} bytes of state XML to {:?}", xml.len(), path);
    Ok(())
}

pub fn save_snapshot(path: &Path, snapshot: &StateSnapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<StateSnapshot> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Snapshot not found: {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Malformed snapshot: {}", path.display()))?;
    Ok(snapshot)
}
