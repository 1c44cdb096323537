use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    #[serde(default = "default_media_url")]
    pub media_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: u64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,

    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    listen_addr: Option<String>,
    log_dir: Option<String>,
    media_dir: Option<String>,
    media_url: Option<String>,
    page_size: Option<u64>,
    max_page_size: Option<u64>,
    token_ttl_hours: Option<i64>,
    password_hash_cost: Option<u32>,
    auto_migrate: Option<bool>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_page_size() -> u64 {
    6
}

fn default_max_page_size() -> u64 {
    100
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_auto_migrate() -> bool {
    true
}

impl ServerConfig {
    /// Defaults for everything but the two required settings.
    pub fn with_defaults(database_url: &str, jwt_secret: &str) -> Self {
        ServerConfig {
            database_url: database_url.to_string(),
            jwt_secret: jwt_secret.to_string(),
            listen_addr: default_listen_addr(),
            log_dir: default_log_dir(),
            media_dir: default_media_dir(),
            media_url: default_media_url(),
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            token_ttl_hours: default_token_ttl_hours(),
            password_hash_cost: default_password_hash_cost(),
            auto_migrate: default_auto_migrate(),
        }
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn read_file(path: &Path) -> Result<PartialServerConfig, String> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    fn merge(primary: PartialServerConfig, fallback: PartialServerConfig) -> Result<Self, String> {
        let config = ServerConfig {
            database_url: primary.database_url.or(fallback.database_url)
                .ok_or("DATABASE_URL is required")?,
            jwt_secret: primary.jwt_secret.or(fallback.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            listen_addr: primary.listen_addr.or(fallback.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: primary.log_dir.or(fallback.log_dir)
                .unwrap_or_else(default_log_dir),
            media_dir: primary.media_dir.or(fallback.media_dir)
                .unwrap_or_else(default_media_dir),
            media_url: primary.media_url.or(fallback.media_url)
                .unwrap_or_else(default_media_url),
            page_size: primary.page_size.or(fallback.page_size)
                .unwrap_or_else(default_page_size),
            max_page_size: primary.max_page_size.or(fallback.max_page_size)
                .unwrap_or_else(default_max_page_size),
            token_ttl_hours: primary.token_ttl_hours.or(fallback.token_ttl_hours)
                .unwrap_or_else(default_token_ttl_hours),
            password_hash_cost: primary.password_hash_cost.or(fallback.password_hash_cost)
                .unwrap_or_else(default_password_hash_cost),
            auto_migrate: primary.auto_migrate.or(fallback.auto_migrate)
                .unwrap_or_else(default_auto_migrate),
        };

        if config.page_size == 0 || config.page_size > config.max_page_size {
            return Err(format!(
                "PAGE_SIZE must be between 1 and MAX_PAGE_SIZE ({})",
                config.max_page_size
            ));
        }
        Ok(config)
    }
}
