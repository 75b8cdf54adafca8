/// `load_config` module: reads `source/_notion/config.yml` and adapts it into
/// the validated [`SyncConfig`] the core pipeline runs on.
///
/// This is the only place where untrusted YAML is parsed. Every key has a
/// default except the database list; entries and the timezone are validated
/// here so that a bad config fails before any network call.
///
/// # Secrets
/// `token_v2` may be written in the file, but the `NOTION_TOKEN_V2`
/// environment variable wins when set.
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary.
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use notion_hexo_core::config::{DatabaseRef, SyncConfig, SyncPaths};
use notion_hexo_core::filter::PublishRule;
use serde::Deserialize;
use tracing::{error, info, warn};

pub const TOKEN_ENV: &str = "NOTION_TOKEN_V2";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub token_v2: String,
    pub database: DatabaseSection,
    pub user: UserSection,
    pub render: RenderSection,
    pub converter: ConverterSection,
    pub publish: PublishSection,
    pub http: HttpSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// `pageID+viewID` entries.
    pub post: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UserSection {
    pub locale: String,
    pub timezone: String,
}

impl Default for UserSection {
    fn default() -> Self {
        Self {
            locale: "en".to_string(),
            timezone: "Etc/UTC".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderSection {
    /// Emit `- [x]` task syntax instead of glyphs.
    pub checkbox: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConverterSection {
    pub force: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PublishSection {
    pub enabled: bool,
    pub field: String,
    pub values: Vec<String>,
}

impl Default for PublishSection {
    fn default() -> Self {
        let rule = PublishRule::default();
        Self {
            enabled: true,
            field: rule.field,
            values: rule.values,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

/// A loaded config split into what the pipeline and the HTTP client need.
#[derive(Debug)]
pub struct Settings {
    pub sync: SyncConfig,
    pub token_v2: Option<String>,
    pub timeout: Duration,
}

/// Read and parse the YAML file at `path`. A missing file is an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");
    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(config_path = ?path_ref, error = %e, "Failed to read config file");
        anyhow!("Failed to read config file {}: {}", path_ref.display(), e)
    })?;
    let config: CliConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(config_path = ?path_ref, error = %e, "Failed to parse config YAML");
        anyhow!("Failed to parse config file {}: {}", path_ref.display(), e)
    })?;
    info!(
        databases = config.database.post.len(),
        timezone = %config.user.timezone,
        "Configuration file parsed"
    );
    Ok(config)
}

impl CliConfig {
    /// Validate and combine with the run's paths. `force` from the command
    /// line is OR-ed with `converter.force`.
    pub fn into_settings(self, paths: SyncPaths, force: bool) -> Result<Settings> {
        let databases = self
            .database
            .post
            .iter()
            .map(|entry| entry.parse::<DatabaseRef>())
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid database.post entry")?;
        if databases.is_empty() {
            warn!("No databases configured; nothing will be published");
        }

        let timezone: Tz = self
            .user
            .timezone
            .parse()
            .map_err(|e| anyhow!("Invalid user.timezone {:?}: {}", self.user.timezone, e))?;

        let publish = self.publish.enabled.then(|| PublishRule {
            field: self.publish.field,
            values: self.publish.values,
        });

        let token_v2 = match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => {
                info!("Using Notion token from {}", TOKEN_ENV);
                Some(token.trim().to_string())
            }
            _ => Some(self.token_v2.trim().to_string()).filter(|t| !t.is_empty()),
        };
        if token_v2.is_none() {
            warn!("No Notion token configured; only public pages are reachable");
        }

        Ok(Settings {
            sync: SyncConfig {
                paths,
                databases,
                timezone,
                checkbox_syntax: self.render.checkbox,
                force_rerender: force || self.converter.force,
                publish,
            },
            token_v2,
            timeout: Duration::from_secs(self.http.timeout_secs),
        })
    }
}
