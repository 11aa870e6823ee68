mod file_config;

pub use file_config::{CatalogConfig, CompletionConfig, FileConfig, ImageConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::warn;

/// CLI arguments that can be used for config resolution. Mirrors the CLI
/// arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    /// Base for generated share links.
    pub base_url: String,
    pub completion: CompletionSettings,
    pub catalog: CatalogSettings,
    pub images: ImageSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file
    /// config. TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        // Completion settings - merge file config with defaults
        let completion_file = file.completion.unwrap_or_default();
        let completion_defaults = CompletionSettings::default();
        let completion = CompletionSettings {
            base_url: completion_file
                .base_url
                .unwrap_or(completion_defaults.base_url),
            api_key: completion_file.api_key,
            api_key_command: completion_file.api_key_command,
            model: completion_file.model.unwrap_or(completion_defaults.model),
            temperature: completion_file
                .temperature
                .unwrap_or(completion_defaults.temperature),
            max_tokens: completion_file
                .max_tokens
                .unwrap_or(completion_defaults.max_tokens),
            timeout_secs: completion_file
                .timeout_secs
                .unwrap_or(completion_defaults.timeout_secs),
        };

        let catalog_file = file.catalog.unwrap_or_default();
        let catalog_defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            auth_url: catalog_file.auth_url.unwrap_or(catalog_defaults.auth_url),
            api_url: catalog_file.api_url.unwrap_or(catalog_defaults.api_url),
            client_id: catalog_file.client_id,
            client_secret: catalog_file.client_secret,
            lookup_delay_ms: catalog_file
                .lookup_delay_ms
                .unwrap_or(catalog_defaults.lookup_delay_ms),
            timeout_secs: catalog_file
                .timeout_secs
                .unwrap_or(catalog_defaults.timeout_secs),
        };

        let images_file = file.images.unwrap_or_default();
        let images_defaults = ImageSettings::default();
        let images = ImageSettings {
            base_url: images_file.base_url.unwrap_or(images_defaults.base_url),
            api_key: images_file.api_key,
            api_key_command: images_file.api_key_command,
            model: images_file.model.unwrap_or(images_defaults.model),
            size: images_file.size.unwrap_or(images_defaults.size),
            request_delay_ms: images_file
                .request_delay_ms
                .unwrap_or(images_defaults.request_delay_ms),
            timeout_secs: images_file
                .timeout_secs
                .unwrap_or(images_defaults.timeout_secs),
        };

        Ok(Self {
            db_dir,
            port,
            base_url,
            completion,
            catalog,
            images,
        })
    }

    pub fn moodboards_db_path(&self) -> PathBuf {
        self.db_dir.join("moodboards.db")
    }
}

/// Settings for the completion provider.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_command: None,
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1200,
            timeout_secs: 120,
        }
    }
}

impl CompletionSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key, &self.api_key_command)
    }
}

/// Settings for the music catalog provider.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub auth_url: String,
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub lookup_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.spotify.com/api/token".to_string(),
            api_url: "https://api.spotify.com/v1".to_string(),
            client_id: None,
            client_secret: None,
            lookup_delay_ms: 100,
            timeout_secs: 30,
        }
    }
}

/// Settings for the image generation provider.
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_key_command: Option<String>,
    pub model: String,
    pub size: String,
    pub request_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            api_key_command: None,
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            request_delay_ms: 1000,
            timeout_secs: 120,
        }
    }
}

impl ImageSettings {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key, &self.api_key_command)
    }
}

/// Resolve an API key from a literal value or, failing that, the stdout of a
/// configured command. A failing command degrades to "unconfigured" rather
/// than aborting startup.
fn resolve_api_key(api_key: &Option<String>, api_key_command: &Option<String>) -> Option<String> {
    if let Some(key) = api_key {
        return Some(key.clone());
    }
    let command = api_key_command.as_ref()?;

    let output = match Command::new("sh").arg("-c").arg(command).output() {
        Ok(output) => output,
        Err(e) => {
            warn!(command = %command, error = %e, "Failed to run api_key_command");
            return None;
        }
    };
    if !output.status.success() {
        warn!(command = %command, status = %output.status, "api_key_command exited with failure");
        return None;
    }

    let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if key.is_empty() {
        warn!(command = %command, "api_key_command produced no output");
        return None;
    }
    Some(key)
}
