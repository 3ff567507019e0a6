//! Configuration loading and parsing.
//!
//! This module handles loading configuration from files, environment variables,
//! and command-line arguments, with proper precedence handling.

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config as ConfigLoader, Environment};
use std::path::{Path, PathBuf};

use super::AppConfig;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "QUICWIRE";

/// Decode hex-encoded QUIC datagrams and log the packets they contain.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, short = 'c', default_value = "quicwire.toml")]
    pub config: PathBuf,

    /// File with one hex datagram per line (stdin when omitted or "-")
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Endpoint role: client or server (overrides config file)
    #[arg(long)]
    pub side: Option<String>,

    /// Length of locally issued connection IDs (overrides config file)
    #[arg(long)]
    pub local_cid_len: Option<usize>,

    /// Key-unavailable retries per datagram (overrides config file)
    #[arg(long)]
    pub max_retries: Option<u8>,

    /// Log level (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Print default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,
}

/// Load and validate the configuration.
///
/// This function implements the configuration precedence:
/// 1. Default values (lowest priority)
/// 2. Configuration file
/// 3. Environment variables (QUICWIRE_ prefix)
/// 4. Command-line arguments (highest priority)
///
/// # Errors
///
/// Returns an error if:
/// - Configuration file cannot be parsed
/// - An override has an invalid value
/// - Validation fails
pub fn load_config(cli: &CliArgs) -> Result<AppConfig> {
    let mut config = load_config_file(&cli.config)?;

    apply_env_overrides(&mut config, env_source())?;
    apply_cli_overrides(&mut config, cli)?;

    config.validate().map_err(|errors| {
        anyhow::anyhow!("Configuration validation failed:\n{}", errors.join("\n"))
    })?;

    Ok(config)
}

/// Load configuration from a TOML file.
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    // If file doesn't exist, use default config
    if !path.exists() {
        tracing::warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(AppConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&config_str)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

pub fn parse_config(toml_str: &str) -> Result<AppConfig> {
    Ok(toml::from_str(toml_str)?)
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// Apply environment variable overrides.
///
/// Environment variables are prefixed with `QUICWIRE_` and use `__` as a
/// separator between section and key.
///
/// Examples:
/// - `QUICWIRE_WIRE__SIDE=client`
/// - `QUICWIRE_PIPELINE__INGRESS_CAPACITY=256`
/// - `QUICWIRE_LOGGING__LEVEL=debug`
pub fn apply_env_overrides(config: &mut AppConfig, env: Environment) -> Result<()> {
    let env_config = ConfigLoader::builder()
        .add_source(env)
        .build()
        .context("Failed to load environment variables")?;

    // Known keys only; unrelated QUICWIRE_* variables are ignored
    if let Ok(side) = env_config.get_string("wire.side") {
        config.wire.side = side.parse().map_err(anyhow::Error::msg)?;
    }
    if let Ok(len) = env_config.get_int("wire.local_cid_len") {
        config.wire.local_cid_len = usize::try_from(len).context("wire.local_cid_len")?;
    }
    if let Ok(versions) = env_config.get_string("wire.supported_versions") {
        config.wire.supported_versions = versions
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
    }
    if let Ok(retries) = env_config.get_int("wire.max_retries") {
        config.wire.max_retries = u8::try_from(retries).context("wire.max_retries")?;
    }
    if let Ok(timeout) = env_config.get_int("wire.retry_timeout_ms") {
        config.wire.retry_timeout_ms = u64::try_from(timeout).context("wire.retry_timeout_ms")?;
    }
    if let Ok(capacity) = env_config.get_int("pipeline.ingress_capacity") {
        config.pipeline.ingress_capacity =
            usize::try_from(capacity).context("pipeline.ingress_capacity")?;
    }
    if let Ok(capacity) = env_config.get_int("pipeline.egress_capacity") {
        config.pipeline.egress_capacity =
            usize::try_from(capacity).context("pipeline.egress_capacity")?;
    }
    if let Ok(timeout) = env_config.get_int("pipeline.offer_timeout_ms") {
        config.pipeline.offer_timeout_ms =
            u64::try_from(timeout).context("pipeline.offer_timeout_ms")?;
    }
    if let Ok(size) = env_config.get_int("buffer_pool.datagram_size") {
        config.buffer_pool.datagram_size =
            usize::try_from(size).context("buffer_pool.datagram_size")?;
    }
    if let Ok(level) = env_config.get_string("logging.level") {
        config.logging.level = level.parse().map_err(anyhow::Error::msg)?;
    }

    Ok(())
}

/// Apply command-line argument overrides.
pub fn apply_cli_overrides(config: &mut AppConfig, cli: &CliArgs) -> Result<()> {
    if let Some(ref side) = cli.side {
        config.wire.side = side.parse().map_err(anyhow::Error::msg)?;
    }

    if let Some(len) = cli.local_cid_len {
        config.wire.local_cid_len = len;
    }

    if let Some(retries) = cli.max_retries {
        config.wire.max_retries = retries;
    }

    if let Some(ref level_str) = cli.log_level {
        if let Ok(level) = level_str.parse() {
            config.logging.level = level;
        } else {
            tracing::warn!(level = %level_str, "Invalid log level specified, ignoring");
        }
    }

    Ok(())
}

/// The default configuration in TOML format.
pub fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&AppConfig::default()).context("Failed to serialize default config")
}
