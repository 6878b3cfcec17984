use std::path::Path;

use config::{Config, File};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub forms: FormsSettings,
    /// Uploaded-file storage. Absent means uploads are skipped with a warning.
    #[serde(default)]
    pub storage: Option<StorageSettings>,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub webhooks: WebhookSettings,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseSettings {
    /// sqlite:, postgres: or mysql: connection URL
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Behavior toggles for form rendering and intake.
#[derive(Debug, Deserialize, Serialize)]
pub struct FormsSettings {
    /// Serve form responses with cache-defeating headers
    #[serde(default = "default_true")]
    pub add_never_cache_headers: bool,
    /// Expose the submissions report endpoints
    #[serde(default = "default_true")]
    pub reports: bool,
    /// Leave HTML in field help text unescaped
    #[serde(default)]
    pub help_text_allow_html: bool,
}

impl Default for FormsSettings {
    fn default() -> Self {
        Self {
            add_never_cache_headers: true,
            reports: true,
            help_text_allow_html: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Local directory uploads are written under
    pub root: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Tera template for the notification subject line
    #[serde(default)]
    pub subject: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            subject: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookSettings {
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Settings {
    pub fn new() -> Result<Self, anyhow::Error> {
        Self::from_file(Path::new("formwork.toml"))
    }

    /// Create settings from CLI arguments (config file plus CLI overrides).
    pub fn new_with_cli(cli: &Cli) -> Result<Self, anyhow::Error> {
        let mut settings = Self::from_file(&cli.config)?;
        settings.apply_cli_overrides(cli);
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let s = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite::memory:")?
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// CLI > config file > defaults.
    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(url) = &cli.database_url {
            self.database.url = url.clone();
        }
        if let Some(root) = &cli.storage_root {
            self.storage = Some(StorageSettings { root: root.clone() });
        }
    }
}
