//! JSON configuration for the supervisor binary: a list of server
//! definitions, each naming a worker count and the services to submit on
//! boot. Loaded with `serde_json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

fn default_thread_count() -> u16 {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(u8::MAX as usize) as u16
}

fn default_unique() -> bool {
    false
}

/// One entry of the top-level JSON array: `[{ "sid": 1, "thread": 4,
/// "services": [...] }, ...]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub sid: u32,
    #[serde(default = "default_thread_count")]
    pub thread: u16,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

/// One `services[]` entry, submitted through `Router::new_service` at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDef {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_unique")]
    pub unique: bool,
    /// 1-based worker hint; `0` lets the router place the service.
    #[serde(default)]
    pub threadid: u8,
    /// Raw bytes handed to the service's `init`. Kept as a JSON value so a
    /// service can shape its own config schema; re-serialized to bytes
    /// before `init` is called.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Loads and parses the `-c <path>` configuration file: a JSON array of
/// [`ServerConfig`] entries.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<ServerConfig>> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("config file not found: {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("failed to parse config: {}", path.display()))
}

/// Loads the `-f <path>` single-service-definition file: one bare
/// [`ServiceDef`] JSON object, not wrapped in a server array.
pub fn load_single_service(path: impl AsRef<Path>) -> Result<ServiceDef> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("service file not found: {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("failed to parse service def: {}", path.display()))
}
