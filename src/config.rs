use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default multilingual embedding model
const DEFAULT_MODEL: &str = "paraphrase-multilingual-minilm-l12-v2";
/// Default number of matches returned per query
const DEFAULT_TOP_K: usize = 5;
/// Default batch size for model encoding
const DEFAULT_EMBED_BATCH_SIZE: usize = 256;
/// Default number of rows per INSERT statement
const DEFAULT_LOAD_BATCH_SIZE: usize = 1000;
/// Table holding the populous-cities dump (`cities15000.txt`)
const DEFAULT_PLACE_TABLE: &str = "geoname_cities15000";
const DEFAULT_ADMIN_TABLE: &str = "admin_codes";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    #[default]
    Postgres,
    Sqlite,
}

/// Reference store connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub driver: DbDriver,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Database name, or the database file path for SQLite (`:memory:` allowed)
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            driver: DbDriver::default(),
            username: String::new(),
            password: String::new(),
            name: String::new(),
            host: default_db_host(),
            port: default_db_port(),
            max_connections: default_max_connections(),
        }
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("driver", &self.driver)
            .field("username", &self.username)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl DbConfig {
    /// In-memory SQLite, single connection so every query sees the same database.
    pub fn sqlite_memory() -> Self {
        Self {
            driver: DbDriver::Sqlite,
            name: ":memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        }
    }

    /// Connection URL. Credentials and database name are percent-encoded.
    pub fn url(&self) -> Result<String, ConfigError> {
        self.build_url(&self.password)
    }

    /// Connection URL with the password masked, for logging.
    pub fn redacted_url(&self) -> String {
        let masked = if self.password.is_empty() { "" } else { "***" };
        self.build_url(masked).unwrap_or_else(|_| match self.driver {
            DbDriver::Postgres => format!("postgres://{}:{}", self.host, self.port),
            DbDriver::Sqlite => format!("sqlite://{}", self.name),
        })
    }

    fn build_url(&self, password: &str) -> Result<String, ConfigError> {
        match self.driver {
            DbDriver::Postgres => {
                let mut url = Url::parse(&format!("postgres://{}:{}", self.host, self.port))
                    .map_err(|e| ConfigError::invalid("database.host", e.to_string()))?;
                url.set_path(&self.name);

                if !self.username.is_empty() {
                    url.set_username(&self.username).map_err(|_| {
                        ConfigError::invalid("database.username", "URL cannot carry credentials")
                    })?;
                    if !password.is_empty() {
                        url.set_password(Some(password)).map_err(|_| {
                            ConfigError::invalid(
                                "database.password",
                                "URL cannot carry credentials",
                            )
                        })?;
                    }
                }

                Ok(url.to_string())
            }
            DbDriver::Sqlite if self.name == ":memory:" => Ok("sqlite::memory:".to_string()),
            DbDriver::Sqlite => Ok(format!("sqlite://{}?mode=rwc", self.name)),
        }
    }
}

/// Which tables feed the consolidated city view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CityViewConfig {
    #[serde(default = "default_place_table")]
    pub place_table: String,

    #[serde(default = "default_admin_table")]
    pub admin_table: String,

    /// Extra population floor on top of the table's own selection
    #[serde(default)]
    pub min_population: Option<i64>,
}

impl Default for CityViewConfig {
    fn default() -> Self {
        Self {
            place_table: default_place_table(),
            admin_table: default_admin_table(),
            min_population: None,
        }
    }
}

/// Embedding and lookup settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Multilingual model name (e.g. "paraphrase-multilingual-minilm-l12-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Model cache directory, defaults to `~/.local/share/geoname-search`
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,

    /// Upper bound on distinct index entries, unbounded when unset
    #[serde(default)]
    pub max_index_entries: Option<usize>,

    #[serde(default = "default_true")]
    pub show_progress: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            cache_dir: None,
            default_top_k: default_top_k(),
            batch_size: default_embed_batch_size(),
            max_index_entries: None,
            show_progress: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default = "default_load_batch_size")]
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_load_batch_size(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_embed_batch_size() -> usize {
    DEFAULT_EMBED_BATCH_SIZE
}

fn default_load_batch_size() -> usize {
    DEFAULT_LOAD_BATCH_SIZE
}

fn default_place_table() -> String {
    DEFAULT_PLACE_TABLE.to_string()
}

fn default_admin_table() -> String {
    DEFAULT_ADMIN_TABLE.to_string()
}

fn default_db_host() -> String {
    DEFAULT_DB_HOST.to_string()
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub cities: CityViewConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

impl Config {
    /// Load configuration: YAML file (if given), then `.env` and process
    /// environment overrides, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(env_path) = dotenvy::dotenv() {
            log::debug!("loaded environment from {}", env_path.display());
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yml::from_str(&config_str).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `DB_*` overrides. `lookup` returns the variable's value if set.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db = &mut self.database;

        if let Some(driver) = lookup("DB_DRIVER") {
            db.driver = match driver.to_lowercase().as_str() {
                "postgres" | "postgresql" => DbDriver::Postgres,
                "sqlite" => DbDriver::Sqlite,
                other => {
                    return Err(ConfigError::invalid(
                        "DB_DRIVER",
                        format!("expected 'postgres' or 'sqlite', got '{other}'"),
                    ))
                }
            };
        }
        if let Some(username) = lookup("DB_USERNAME") {
            db.username = username;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            db.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            db.name = name;
        }
        if let Some(host) = lookup("DB_HOST") {
            db.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            db.port = port.parse().map_err(|_| {
                ConfigError::invalid("DB_PORT", format!("'{port}' is not a valid port"))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.name.is_empty() {
            return Err(ConfigError::invalid(
                "database.name",
                "database name is required (set DB_NAME)",
            ));
        }
        self.database.url()?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections",
                "must be greater than 0",
            ));
        }
        if self.search.default_top_k == 0 {
            return Err(ConfigError::invalid(
                "search.default_top_k",
                "must be greater than 0",
            ));
        }
        if self.search.batch_size == 0 {
            return Err(ConfigError::invalid(
                "search.batch_size",
                "must be greater than 0",
            ));
        }
        if self.search.max_index_entries == Some(0) {
            return Err(ConfigError::invalid(
                "search.max_index_entries",
                "must be greater than 0 when set",
            ));
        }
        if self.loader.batch_size == 0 {
            return Err(ConfigError::invalid(
                "loader.batch_size",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Directory holding downloaded model files.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.search.cache_dir {
            return dir.clone();
        }

        match homedir::my_home() {
            Ok(Some(home)) => home.join(".local/share/geoname-search"),
            _ => std::env::temp_dir().join("geoname-search"),
        }
    }
}
