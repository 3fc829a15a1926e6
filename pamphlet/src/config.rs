//! INI configuration file.
//!
//! Settings live in `~/.pamphlet/config.ini`. A missing file yields the
//! defaults; unknown keys are ignored. Command-line flags override whatever
//! the file says, so the CLI loads a [`ConfigFile`] first and then applies
//! its `with_*` overrides.
//!
//! ```ini
//! [server]
//! bind = 127.0.0.1:8787
//!
//! [storage]
//! directory = /home/me/.pamphlet/data
//!
//! [cache]
//! max_size_mb = 512
//! tile_ttl_secs = 86400
//! metadata_max_age_secs = 60
//!
//! [client]
//! api_base = http://127.0.0.1:8787
//! max_concurrent = 6
//! session_cache_tiles = 512
//!
//! [logging]
//! directory = /home/me/.pamphlet/logs
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::client::{DEFAULT_API_BASE, DEFAULT_MAX_CONCURRENT, DEFAULT_SESSION_CACHE_TILES};
use crate::server::DEFAULT_METADATA_MAX_AGE;

/// Name of the per-user configuration directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".pamphlet";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default bind address for `pamphlet serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Default edge cache budget (512 MB).
pub const DEFAULT_CACHE_MAX_SIZE_BYTES: u64 = 512 * 1024 * 1024;

/// Default edge cache TTL for tiles (one day).
pub const DEFAULT_TILE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const MB: u64 = 1024 * 1024;

/// Errors from loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// `[server]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

/// `[storage]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    /// Root of the filesystem blob and metadata stores.
    pub directory: PathBuf,
}

/// `[cache]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub max_size_bytes: u64,
    pub tile_ttl: Duration,
    pub metadata_max_age: Duration,
}

/// `[client]` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base: String,
    pub max_concurrent: usize,
    pub session_cache_tiles: u64,
}

/// `[logging]` settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoggingSettings {
    /// Directory for the daily rolling log file. `None` logs to stderr only.
    pub directory: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub client: ClientSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            },
            storage: StorageSettings {
                directory: config_directory().join("data"),
            },
            cache: CacheSettings {
                max_size_bytes: DEFAULT_CACHE_MAX_SIZE_BYTES,
                tile_ttl: DEFAULT_TILE_TTL,
                metadata_max_age: DEFAULT_METADATA_MAX_AGE,
            },
            client: ClientSettings {
                api_base: DEFAULT_API_BASE.to_string(),
                max_concurrent: DEFAULT_MAX_CONCURRENT,
                session_cache_tiles: DEFAULT_SESSION_CACHE_TILES,
            },
            logging: LoggingSettings::default(),
        }
    }
}

/// `~/.pamphlet`, or `./.pamphlet` when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Full path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = parse_value::<SocketAddr>(ini, "server", "bind")? {
            config.server.bind = bind;
        }

        if let Some(dir) = non_empty(ini, "storage", "directory") {
            config.storage.directory = PathBuf::from(dir);
        }

        if let Some(mb) = parse_value::<u64>(ini, "cache", "max_size_mb")? {
            config.cache.max_size_bytes = mb * MB;
        }
        if let Some(secs) = parse_value::<u64>(ini, "cache", "tile_ttl_secs")? {
            config.cache.tile_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_value::<u64>(ini, "cache", "metadata_max_age_secs")? {
            config.cache.metadata_max_age = Duration::from_secs(secs);
        }

        if let Some(base) = non_empty(ini, "client", "api_base") {
            config.client.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(n) = parse_value::<usize>(ini, "client", "max_concurrent")? {
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    section: "client",
                    key: "max_concurrent",
                    value: "0".to_string(),
                });
            }
            config.client.max_concurrent = n;
        }
        if let Some(n) = parse_value::<u64>(ini, "client", "session_cache_tiles")? {
            config.client.session_cache_tiles = n;
        }

        if let Some(dir) = non_empty(ini, "logging", "directory") {
            config.logging.directory = Some(PathBuf::from(dir));
        }

        Ok(config)
    }

    /// Render as INI.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for (section, key, value) in self.entries() {
            ini.with_section(Some(section)).set(key, value);
        }
        ini
    }

    /// Save to the default location, creating `~/.pamphlet` if needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Every setting as `(section, key, value)`, in file order.
    ///
    /// An unset optional value renders as an empty string.
    pub fn entries(&self) -> Vec<(&'static str, &'static str, String)> {
        vec![
            ("server", "bind", self.server.bind.to_string()),
            (
                "storage",
                "directory",
                self.storage.directory.display().to_string(),
            ),
            (
                "cache",
                "max_size_mb",
                (self.cache.max_size_bytes / MB).to_string(),
            ),
            (
                "cache",
                "tile_ttl_secs",
                self.cache.tile_ttl.as_secs().to_string(),
            ),
            (
                "cache",
                "metadata_max_age_secs",
                self.cache.metadata_max_age.as_secs().to_string(),
            ),
            ("client", "api_base", self.client.api_base.clone()),
            (
                "client",
                "max_concurrent",
                self.client.max_concurrent.to_string(),
            ),
            (
                "client",
                "session_cache_tiles",
                self.client.session_cache_tiles.to_string(),
            ),
            (
                "logging",
                "directory",
                self.logging
                    .directory
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            ),
        ]
    }

    // =========================================================================
    // Overrides
    // =========================================================================

    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.server.bind = bind;
        self
    }

    pub fn with_storage_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.storage.directory = directory.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.client.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.client.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_log_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.logging.directory = Some(directory.into());
        self
    }
}

fn non_empty<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.get_from(Some(section), key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(
    ini: &Ini,
    section: &'static str,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match non_empty(ini, section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section,
                key,
                value: raw.to_string(),
            }),
    }
}
