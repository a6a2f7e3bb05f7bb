use std::error::Error;
use std::path::PathBuf;
use std::{env, io};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub node_id: u8,
    pub report_interval_ms: u32,
    pub time_scale: u32,
    pub storage_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub node: Node,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let mut settings = Self::parse(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/default.toml"
        )))?;

        settings.node.storage_path = Self::normalize_path(&settings.node.storage_path)?
            .to_string_lossy()
            .to_string();

        Ok(settings)
    }

    pub fn parse(source: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(source)?;

        if settings.node.time_scale == 0 {
            return Err("node.time_scale must be at least 1".into());
        }

        Ok(settings)
    }

    fn normalize_path(path: &str) -> io::Result<PathBuf> {
        let path_buf = PathBuf::from(path);

        Ok(if path_buf.is_absolute() {
            path_buf
        } else {
            env::current_dir()?.as_path().join(&path_buf)
        })
    }
}
