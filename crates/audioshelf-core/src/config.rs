use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dedup::EquivalenceMode;
use crate::error::{Result, ShelfError};

/// Root application configuration, loaded from `~/.config/audioshelf/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub core: CoreConfig,
    pub remote: RemoteConfig,
    pub dedup: DedupConfig,
    pub hashing: HashingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory holding `db/audioshelf.db`.
    pub library_path: String,
}

/// Catalog service used by the `remote` commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub default_mode: EquivalenceMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    pub chunk_size_bytes: usize,
    pub verify_sample_size: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for CoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("audioshelf");

        Self {
            library_path: data_dir.to_string_lossy().to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001/api".to_string(),
            timeout_secs: 30,
            user_agent: concat!("audioshelf/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            default_mode: EquivalenceMode::TitleAuthor,
        }
    }
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 8 * 1024 * 1024,
            verify_sample_size: 10,
        }
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/audioshelf/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("AUDIOSHELF_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("audioshelf")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if the file doesn't exist.
    /// `AUDIOSHELF_LIBRARY_PATH` overrides `core.library_path`.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        if let Ok(library) = std::env::var("AUDIOSHELF_LIBRARY_PATH") {
            config.core.library_path = library;
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.hashing.chunk_size_bytes == 0 {
            return Err(ShelfError::ConfigError(
                "hashing.chunk_size_bytes must be greater than zero".into(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(ShelfError::ConfigError(
                "remote.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    // ─── Derived paths ─────────────────────────────────────

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.core.library_path)
            .join("db")
            .join("audioshelf.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.dedup.default_mode, EquivalenceMode::TitleAuthor);
        assert_eq!(cfg.hashing.chunk_size_bytes, 8 * 1024 * 1024);
        assert!(!cfg.core.library_path.is_empty());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.dedup.default_mode = EquivalenceMode::ExactContent;
        cfg.remote.base_url = "http://nas.local:5001/api".into();
        cfg.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.dedup.default_mode, EquivalenceMode::ExactContent);
        assert_eq!(loaded.remote.base_url, "http://nas.local:5001/api");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[dedup]\ndefault_mode = \"hash\"\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.dedup.default_mode, EquivalenceMode::ExactContent);
        assert_eq!(loaded.remote.timeout_secs, 30);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hashing]\nchunk_size_bytes = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ShelfError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let cfg = AppConfig::load_from(Path::new("/tmp/nonexistent_audioshelf_config.toml")).unwrap();
        assert_eq!(cfg.remote.timeout_secs, 30);
    }

    #[test]
    fn test_database_path() {
        let cfg = AppConfig::default();
        assert!(cfg.database_path().to_string_lossy().ends_with("audioshelf.db"));
    }
}
