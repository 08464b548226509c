use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Main server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub identity_store: IdentityStoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 15600,
        }
    }
}

/// Supabase project the gate resolves identities against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityStoreConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    /// Overridden by the SUPABASE_URL environment variable
    #[serde(default)]
    pub url: String,

    /// Public anon key, sent as `apikey` on auth endpoints
    /// Overridden by SUPABASE_ANON_KEY
    #[serde(default)]
    pub anon_key: String,

    /// Service role key for table reads (falls back to the anon key)
    /// Overridden by SUPABASE_SERVICE_ROLE_KEY
    #[serde(default)]
    pub service_role_key: String,

    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Default for IdentityStoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            service_role_key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl IdentityStoreConfig {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the gate looks for credentials and target plants on a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Cookie holding the access token when no Authorization header is sent
    #[serde(default = "default_access_token_cookie")]
    pub access_token_cookie: String,

    /// Accept the access-token cookie as a fallback
    #[serde(default = "default_true")]
    pub cookie_fallback: bool,

    /// Header naming the plant a request targets
    #[serde(default = "default_plant_header")]
    pub plant_header: String,

    /// Query parameter naming the plant a request targets
    #[serde(default = "default_plant_query_param")]
    pub plant_query_param: String,
}

fn default_access_token_cookie() -> String {
    "sb-access-token".to_string()
}

fn default_true() -> bool {
    true
}

fn default_plant_header() -> String {
    "x-plant-id".to_string()
}

fn default_plant_query_param() -> String {
    "plant_id".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_cookie: default_access_token_cookie(),
            cookie_fallback: true,
            plant_header: default_plant_header(),
            plant_query_param: default_plant_query_param(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Apply SUPABASE_* environment variables on top of file values
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let store = &mut self.identity_store;
        for (name, slot) in [
            ("SUPABASE_URL", &mut store.url),
            ("SUPABASE_ANON_KEY", &mut store.anon_key),
            ("SUPABASE_SERVICE_ROLE_KEY", &mut store.service_role_key),
        ] {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                debug!("{} taken from environment", name);
                *slot = value;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let store = &self.identity_store;

        if store.url.is_empty() {
            return Err("identity_store.url is required. Set SUPABASE_URL".to_string());
        }

        if !store.url.starts_with("http://") && !store.url.starts_with("https://") {
            return Err(format!(
                "identity_store.url must be an http(s) URL, got {}",
                store.url
            ));
        }

        if store.anon_key.is_empty() {
            return Err(
                "identity_store.anon_key is required. Set SUPABASE_ANON_KEY".to_string(),
            );
        }

        if store.timeout_secs == 0 || store.timeout_secs > 120 {
            return Err("identity_store.timeout_secs must be between 1 and 120".to_string());
        }

        if self.auth.plant_header.is_empty() || self.auth.plant_query_param.is_empty() {
            return Err("auth.plant_header and auth.plant_query_param must be set".to_string());
        }

        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
