//! Hot-reloaded engine config. On each `current()` call the file's modified
//! time is checked and the TOML reparsed if it changed. A file that fails to
//! parse or validate keeps the last good config in place.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::SystemTime,
};

use tracing::{info, warn};

use super::{EngineConfig, DEFAULT_CONFIG_PATH};

#[derive(Debug)]
pub struct HotReloadConfig {
    path: PathBuf,
    inner: RwLock<State>,
}

#[derive(Debug)]
struct State {
    config: Arc<EngineConfig>,
    last_modified: Option<SystemTime>,
}

impl HotReloadConfig {
    /// Watch `path` (defaults to `config/engine.toml`).
    pub fn new(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self {
            path,
            inner: RwLock::new(State {
                config: Arc::new(EngineConfig::default()),
                last_modified: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest config, reloading if the file changed.
    pub fn current(&self) -> Arc<EngineConfig> {
        let needs_reload = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(mtime) => {
                let guard = self.inner.read().expect("config lock poisoned");
                guard.last_modified != Some(mtime)
            }
            // Missing file: keep what we have.
            Err(_) => false,
        };

        if !needs_reload {
            return self.inner.read().expect("config lock poisoned").config.clone();
        }

        let mut guard = self.inner.write().expect("config lock poisoned");
        // Double-check in case another thread reloaded meanwhile.
        if let Ok(mtime) = fs::metadata(&self.path).and_then(|m| m.modified()) {
            if guard.last_modified != Some(mtime) {
                match EngineConfig::load_from_file(&self.path) {
                    Ok(cfg) => {
                        info!(path = %self.path.display(), "engine config reloaded");
                        guard.config = Arc::new(cfg);
                    }
                    Err(e) => {
                        warn!(path = %self.path.display(), error = %e, "engine config rejected, keeping previous");
                    }
                }
                // Remember the mtime either way so a bad file isn't reparsed on every call.
                guard.last_modified = Some(mtime);
            }
        }
        guard.config.clone()
    }
}
