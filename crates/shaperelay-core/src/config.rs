use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "shaperelay.toml";
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.shapes.inc";
pub const DEFAULT_MODEL_NAMESPACE: &str = "shapesinc";
pub const DEFAULT_RELAY_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 3600; // well past Discord's redelivery window
pub const DEFAULT_DEDUP_CAPACITY: u64 = 10_000;
pub const DEFAULT_KEEPALIVE_BIND: &str = "0.0.0.0";
pub const DEFAULT_KEEPALIVE_PORT: u16 = 3000;

/// Legacy environment variables of the first bot release, mapped onto the config tree.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("DISCORD_BOT_TOKEN", "discord.bot_token"),
    ("SHAPESINC_API_KEY", "shapes.api_key"),
    ("SHAPESINC_SHAPE_USERNAME", "shapes.shape_username"),
];

/// Top-level config (shaperelay.toml + SHAPERELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub discord: DiscordConfig,
    pub shapes: ShapesConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub keepalive: KeepAliveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Register the `/network status` command on ready.
    #[serde(default = "bool_true")]
    pub register_commands: bool,
    /// Presence status: online, idle, dnd, invisible.
    #[serde(default = "default_status")]
    pub status: String,
    pub activity_name: Option<String>,
    /// playing, listening, watching, competing, custom. Defaults to playing.
    pub activity_type: Option<String>,
}

/// Completion provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapesConfig {
    pub api_key: String,
    pub shape_username: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ShapesConfig {
    /// Model identifier sent in every relay request, e.g. `shapesinc/my-shape`.
    pub fn model_identifier(&self) -> String {
        format!("{}/{}", self.namespace, self.shape_username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Seconds an event id stays in the ledger.
    #[serde(default = "default_dedup_window")]
    pub window_secs: u64,
    /// Upper bound on remembered ids per ledger set.
    #[serde(default = "default_dedup_capacity")]
    pub capacity: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_DEDUP_WINDOW_SECS,
            capacity: DEFAULT_DEDUP_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_keepalive_bind")]
    pub bind: String,
    #[serde(default = "default_keepalive_port")]
    pub port: u16,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: DEFAULT_KEEPALIVE_BIND.to_string(),
            port: DEFAULT_KEEPALIVE_PORT,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_status() -> String {
    "online".to_string()
}
fn default_namespace() -> String {
    DEFAULT_MODEL_NAMESPACE.to_string()
}
fn default_base_url() -> String {
    DEFAULT_PROVIDER_BASE_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_RELAY_TIMEOUT_SECS
}
fn default_dedup_window() -> u64 {
    DEFAULT_DEDUP_WINDOW_SECS
}
fn default_dedup_capacity() -> u64 {
    DEFAULT_DEDUP_CAPACITY
}
fn default_keepalive_bind() -> String {
    DEFAULT_KEEPALIVE_BIND.to_string()
}
fn default_keepalive_port() -> u16 {
    DEFAULT_KEEPALIVE_PORT
}

impl RelayConfig {
    /// Load config from a TOML file, then SHAPERELAY_* env vars, then the
    /// legacy DISCORD_BOT_TOKEN / SHAPESINC_* variables.
    ///
    /// Path resolution: explicit argument, else `./shaperelay.toml`. A missing
    /// file is not an error; missing credentials are.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        Self::from_figment(Self::figment(path))
    }

    /// The provider stack used by [`RelayConfig::load`].
    pub fn figment(path: &str) -> Figment {
        let legacy_keys: Vec<&str> = LEGACY_ENV.iter().map(|(env, _)| *env).collect();

        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SHAPERELAY_").split("__"))
            .merge(Env::raw().only(&legacy_keys[..]).map(|key| {
                LEGACY_ENV
                    .iter()
                    .find(|(env, _)| key == *env)
                    .map(|(_, tree_path)| (*tree_path).into())
                    .unwrap_or_else(|| key.as_str().to_owned().into())
            }))
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        let config: RelayConfig = figment
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would only fail later, after connecting.
    pub fn validate(&self) -> crate::error::Result<()> {
        let required = [
            ("discord.bot_token", &self.discord.bot_token),
            ("shapes.api_key", &self.shapes.api_key),
            ("shapes.shape_username", &self.shapes.shape_username),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(crate::error::RelayError::Config(format!(
                "missing required credentials: {}",
                missing.join(", ")
            )));
        }
        if self.shapes.timeout_secs == 0 {
            return Err(crate::error::RelayError::Config(
                "shapes.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.dedup.capacity == 0 || self.dedup.window_secs == 0 {
            return Err(crate::error::RelayError::Config(
                "dedup.window_secs and dedup.capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn legacy_env_vars_fill_credentials() {
        Jail::expect_with(|jail| {
            jail.set_env("DISCORD_BOT_TOKEN", "token-abc");
            jail.set_env("SHAPESINC_API_KEY", "key-xyz");
            jail.set_env("SHAPESINC_SHAPE_USERNAME", "tessa");

            let config = RelayConfig::load(Some("absent.toml")).expect("config");
            assert_eq!(config.discord.bot_token, "token-abc");
            assert_eq!(config.shapes.api_key, "key-xyz");
            assert_eq!(config.shapes.model_identifier(), "shapesinc/tessa");
            assert_eq!(config.shapes.timeout_secs, 20);
            assert_eq!(config.dedup.capacity, DEFAULT_DEDUP_CAPACITY);
            assert!(config.keepalive.enabled);
            Ok(())
        });
    }

    #[test]
    fn toml_file_and_prefixed_env_merge() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
                [discord]
                bot_token = "file-token"
                register_commands = false

                [shapes]
                api_key = "file-key"
                shape_username = "file-shape"
                namespace = "custom"

                [keepalive]
                port = 8080
                "#,
            )?;
            jail.set_env("SHAPERELAY_SHAPES__TIMEOUT_SECS", "5");

            let config = RelayConfig::load(Some("relay.toml")).expect("config");
            assert!(!config.discord.register_commands);
            assert_eq!(config.shapes.model_identifier(), "custom/file-shape");
            assert_eq!(config.shapes.timeout_secs, 5);
            assert_eq!(config.keepalive.port, 8080);
            Ok(())
        });
    }

    #[test]
    fn missing_credentials_is_a_config_error() {
        Jail::expect_with(|_jail| {
            let err = RelayConfig::load(Some("absent.toml")).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }

    #[test]
    fn blank_credentials_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "blank.toml",
                r#"
                [discord]
                bot_token = "token"

                [shapes]
                api_key = "   "
                shape_username = "tessa"
                "#,
            )?;

            let err = RelayConfig::load(Some("blank.toml")).unwrap_err();
            assert!(err.to_string().contains("shapes.api_key"));
            Ok(())
        });
    }
}
