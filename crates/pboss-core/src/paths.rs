use std::path::{Path, PathBuf};

/// All well-known per-user paths used by pboss.
#[derive(Debug, Clone)]
pub struct PbossPaths {
    pub config_dir: PathBuf,
    pub config_json: PathBuf,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl PbossPaths {
    /// Resolve from the platform config and data directories.
    /// Falls back to `~/.pboss/` and finally `./.pboss/`.
    pub fn discover() -> Self {
        let fallback = || {
            dirs::home_dir()
                .map(|h| h.join(".pboss"))
                .unwrap_or_else(|| PathBuf::from(".pboss"))
        };
        let config_root = dirs::config_dir()
            .map(|d| d.join("pboss"))
            .unwrap_or_else(fallback);
        let data_root = dirs::data_dir()
            .map(|d| d.join("pboss"))
            .unwrap_or_else(fallback);
        Self::from_roots(config_root, data_root)
    }

    /// Derive all paths under explicit roots. Pure computation, no I/O.
    pub fn from_roots(config_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        let data_dir = data_dir.into();
        Self {
            config_json: config_dir.join("config.json"),
            logs_dir: data_dir.join("logs"),
            config_dir,
            data_dir,
        }
    }

    /// Single-root layout, used by tests.
    pub fn under(root: &Path) -> Self {
        Self::from_roots(root.join("config"), root.join("data"))
    }

    /// Create config and log directories. Idempotent.
    pub fn ensure_layout(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }
}
