//! Server configuration (spec.md §6, "Configuration"). Loaded from a TOML
//! file via `confy` — the same load-a-struct-with-defaults shape the
//! teacher's CLI config loader uses — with environment variable overrides
//! for the fields an operator most commonly needs to flip per-deployment.

use serde_derive::{Deserialize, Serialize};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8098;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Interface to bind the HTTP/WebSocket listener to.
    pub bind_address: String,
    /// Listening port.
    pub port: u16,
    /// Connection string for the backing coordination store. Unused by the
    /// in-process `MemoryStore` reference implementation, but carried so a
    /// networked `Store` can be swapped in without a config schema change.
    pub store_connection_string: String,
    pub object_store: ObjectStoreConfig,
    /// Read but not consulted by the pipeline: this build adopts
    /// UI-initiated save only (see DESIGN.md, "Open question resolved").
    /// Carried so operators migrating from a background-autosave deployment
    /// are not broken by an unrecognized config key.
    pub autosave_interval_ms: u64,
    pub room_cleanup_interval_ms: u64,
    pub max_retries: u32,
    pub stale_session_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub credentials: String,
    pub bucket: String,
    pub region: String,
    /// Local directory backing the reference `FsObjectStore`
    /// (see [`crate::objectstore`]) when no real object-store endpoint is
    /// configured. Not part of spec.md's field list; an ambient detail of
    /// this build's reference collaborator.
    pub local_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            store_connection_string: "memory://local".to_string(),
            object_store: ObjectStoreConfig::default(),
            autosave_interval_ms: 30_000,
            room_cleanup_interval_ms: 30_000,
            max_retries: doccoord_kv::pipeline::DEFAULT_MAX_RETRIES,
            stale_session_minutes: 2,
        }
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig {
            endpoint: String::new(),
            credentials: String::new(),
            bucket: "doccoord-documents".to_string(),
            region: String::new(),
            local_path: "storage/documents".to_string(),
        }
    }
}

impl Config {
    /// Loads `path` if given, else the platform config directory entry for
    /// `doccoord-server`, falling back to defaults on any read/parse error
    /// so a missing config file is never fatal. Environment variables take
    /// precedence over whatever was loaded from disk.
    pub fn load(path: Option<&str>) -> Self {
        let mut cfg = match path {
            Some(path) => confy::load_path(path).unwrap_or_default(),
            None => confy::load("doccoord-server", Some("config")).unwrap_or_default(),
        };
        cfg.apply_env_overrides();
        cfg
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DOCCOORD_BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Ok(v) = std::env::var("DOCCOORD_PORT") {
            if let Ok(port) = v.parse() {
                self.port = port;
            }
        }
        if let Ok(v) = std::env::var("DOCCOORD_STORE_CONNECTION_STRING") {
            self.store_connection_string = v;
        }
        if let Ok(v) = std::env::var("DOCCOORD_MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                self.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("DOCCOORD_STALE_SESSION_MINUTES") {
            if let Ok(n) = v.parse() {
                self.stale_session_minutes = n;
            }
        }
        if let Ok(v) = std::env::var("DOCCOORD_ROOM_CLEANUP_INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.room_cleanup_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("DOCCOORD_OBJECT_STORE_LOCAL_PATH") {
            self.object_store.local_path = v;
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid bind address/port: {err}"))
    }

    pub fn engine_config(&self) -> doccoord_kv::EngineConfig {
        doccoord_kv::EngineConfig {
            max_retries: self.max_retries,
            stale_session_threshold: std::time::Duration::from_secs(self.stale_session_minutes * 60),
        }
    }

    pub fn room_cleanup_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.room_cleanup_interval_ms)
    }
}
