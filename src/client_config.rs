//! Persisted Hummingbot client config (`conf/conf_client.yml`)
//!
//! The document is kept as an ordered YAML mapping so keys this launcher does
//! not know about survive a load/save cycle untouched.

use serde_yaml::{Mapping, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{LauncherError, Result};

/// Location of the client config relative to the Hummingbot root
pub const CONF_CLIENT_PATH: &str = "conf/conf_client.yml";

/// In-memory client config loaded once per run and written once at the end
#[derive(Debug, Clone)]
pub struct ClientConfig {
    path: PathBuf,
    doc: Mapping,
}

impl ClientConfig {
    /// Empty document bound to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            doc: Mapping::new(),
        }
    }

    /// Load the document at `path`.
    ///
    /// A missing file, or one whose top level is not a mapping, yields an empty
    /// document. Only other I/O failures are errors.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet, starting empty", path.display());
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(LauncherError::ConfigRead { path, source }),
        };

        let doc = match serde_yaml::from_str::<Value>(&text) {
            Ok(Value::Mapping(doc)) => doc,
            Ok(Value::Null) => Mapping::new(),
            Ok(_) => {
                warn!(
                    "{} is not a YAML mapping, treating it as empty",
                    path.display()
                );
                Mapping::new()
            }
            Err(e) => {
                warn!("Could not parse {} ({}), treating it as empty", path.display(), e);
                Mapping::new()
            }
        };

        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Mapping {
        &self.doc
    }

    /// Value at a nested key path, e.g. `["mqtt_bridge", "mqtt_port"]`
    pub fn get(&self, key_path: &[&str]) -> Option<&Value> {
        let (last, parents) = key_path.split_last()?;
        let mut map = &self.doc;
        for key in parents {
            match map.get(*key) {
                Some(Value::Mapping(child)) => map = child,
                _ => return None,
            }
        }
        map.get(*last)
    }

    /// Set a nested value, creating parent mappings. A parent that exists but
    /// is not a mapping is replaced by one.
    pub fn set(&mut self, key_path: &[&str], value: Value) {
        set_in(&mut self.doc, key_path, value);
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.doc)?)
    }

    /// Write the document back to its path via temp file + rename
    pub fn save(&self) -> Result<()> {
        let yaml = self.to_yaml()?;
        let write_err = |source: std::io::Error| LauncherError::ConfigWrite {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
        tmp.write_all(yaml.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

fn set_in(map: &mut Mapping, key_path: &[&str], value: Value) {
    match key_path {
        [] => {}
        [last] => {
            map.insert(Value::String(last.to_string()), value);
        }
        [head, rest @ ..] => {
            let key = Value::String(head.to_string());
            if !matches!(map.get(&key), Some(Value::Mapping(_))) {
                map.insert(key.clone(), Value::Mapping(Mapping::new()));
            }
            if let Some(Value::Mapping(child)) = map.get_mut(&key) {
                set_in(child, rest, value);
            }
        }
    }
}
