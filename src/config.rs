use serde::Deserialize;
use std::path::Path;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "jpegmark.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_quality")]
    pub quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quality: default_quality(),
        }
    }
}

fn default_quality() -> u8 {
    75
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        Self::parse(&content)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_PATH);
                if fallback.exists() {
                    Self::load(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.settings.log_level.trim().is_empty() {
            anyhow::bail!("settings.log_level must not be empty");
        }
        if !(1..=100).contains(&self.output.quality) {
            anyhow::bail!("output.quality must be 1–100, got {}", self.output.quality);
        }
        Ok(())
    }
}
