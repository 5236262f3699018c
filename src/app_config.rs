//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use harvester_core::LoginPolicy;

/// File-backed configuration for harvester defaults.
#[derive(Debug, Clone, Default)]
pub struct FileConfig {
    /// Portal login endpoint.
    pub login_url: Option<String>,
    /// Portal listing endpoint.
    pub listing_url: Option<String>,
    /// Prefix for root-relative document links.
    pub base_url: Option<String>,
    /// Referer sent with portal requests.
    pub referer_url: Option<String>,
    /// Company tax id used to log in.
    pub ruc: Option<String>,
    /// Portal user name.
    pub login: Option<String>,
    /// Portal password. `HARVESTER_PASSWORD` takes precedence.
    pub password: Option<String>,
    /// Default output directory for downloads.
    pub output_dir: Option<PathBuf>,
    /// Listing page size (1..=1000).
    pub page_size: Option<u32>,
    /// Default concurrency (same range as CLI).
    pub concurrency: Option<u8>,
    /// Verify portal TLS certificates.
    pub verify_tls: Option<bool>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP whole-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// What to do when the login request fails.
    pub login_failure: Option<LoginPolicy>,
    /// Which startup access check to run.
    pub access_gate: Option<AccessGateSetting>,
    /// Trial length in days.
    pub trial_days: Option<u32>,
    /// Trial first-use marker file.
    pub trial_marker: Option<PathBuf>,
    /// Signed license token file.
    pub license_file: Option<PathBuf>,
    /// Base64 Ed25519 public key trusted for license tokens.
    pub license_public_key: Option<String>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(page_size) = self.page_size
            && !(1..=1000).contains(&page_size)
        {
            bail!("Invalid config value for `page_size`: {page_size}. Expected range: 1..=1000");
        }

        if let Some(trial_days) = self.trial_days
            && trial_days == 0
        {
            bail!("Invalid config value for `trial_days`: 0. Expected a positive number of days");
        }

        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;

        if self.access_gate == Some(AccessGateSetting::License)
            && (self.license_file.is_none() || self.license_public_key.is_none())
        {
            bail!("`access_gate = \"license\"` requires `license_file` and `license_public_key`");
        }

        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

/// Startup access check selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessGateSetting {
    #[default]
    Open,
    Trial,
    License,
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the harvester config directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester`
/// 2. `$HOME/.config/harvester`
#[must_use]
pub fn resolve_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("harvester"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join("harvester"))
}

/// Resolves default config path inside [`resolve_config_dir`].
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    resolve_config_dir().map(|dir| dir.join("config.toml"))
}

pub(crate) fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig { path, config: None });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let line_number = line_index + 1;
        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "login_url" => cfg.login_url = Some(parse_string_literal(value).with_context(invalid)?),
            "listing_url" => {
                cfg.listing_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?),
            "referer_url" => {
                cfg.referer_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "ruc" => cfg.ruc = Some(parse_string_literal(value).with_context(invalid)?),
            "login" => cfg.login = Some(parse_string_literal(value).with_context(invalid)?),
            "password" => cfg.password = Some(parse_string_literal(value).with_context(invalid)?),
            "output_dir" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "page_size" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("page_size out of range for u32"))?;
                cfg.page_size = Some(n);
            }
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(invalid)?),
            "verify_tls" => cfg.verify_tls = Some(parse_boolean(value).with_context(invalid)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "login_failure" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.login_failure = Some(parse_login_failure(&parsed).with_context(|| {
                    format!("Invalid `login_failure` value '{parsed}' on line {line_number}")
                })?);
            }
            "access_gate" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.access_gate = Some(parse_access_gate(&parsed).with_context(|| {
                    format!("Invalid `access_gate` value '{parsed}' on line {line_number}")
                })?);
            }
            "trial_days" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("trial_days out of range for u32"))?;
                cfg.trial_days = Some(n);
            }
            "trial_marker" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.trial_marker = Some(PathBuf::from(parsed));
            }
            "license_file" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.license_file = Some(PathBuf::from(parsed));
            }
            "license_public_key" => {
                cfg.license_public_key = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_login_failure(value: &str) -> Result<LoginPolicy> {
    match value {
        "abort" => Ok(LoginPolicy::Abort),
        "continue" => Ok(LoginPolicy::Continue),
        _ => bail!("Expected one of: abort, continue"),
    }
}

fn parse_access_gate(value: &str) -> Result<AccessGateSetting> {
    match value {
        "open" => Ok(AccessGateSetting::Open),
        "trial" => Ok(AccessGateSetting::Trial),
        "license" => Ok(AccessGateSetting::License),
        _ => bail!("Expected one of: open, trial, license"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}
