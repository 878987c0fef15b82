// Configuration management module
// TOML file settings with environment variable overrides

pub mod settings;

#[cfg(test)]
mod tests;

pub use settings::{
    Config, ConfigError, DocumentsConfig, EmbeddingConfig, LlmConfig, ServerConfig, VectorBackend,
    VectorStoreConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}

/// Print the effective configuration as TOML
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config)?;
    println!("# Base directory: {}", config.get_base_dir().display());
    println!("{}", rendered);
    Ok(())
}
