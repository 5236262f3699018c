//! Configuration lifecycle: load file config, read the environment, merge CLI.

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::app::config_runtime::{self, CliValueSources, EnvInputs, RunSettings};
use crate::app_config::{env_var_non_empty_os, load_default_file_config, resolve_config_dir};
use crate::cli::Cli;

/// Environment variable holding the portal password.
pub(crate) const PASSWORD_ENV: &str = "HARVESTER_PASSWORD";

/// Load file config, merge CLI overrides and environment values.
/// Single entry point that returns the resolved run settings.
pub(crate) fn resolve_config(cli: &Cli, cli_sources: &CliValueSources) -> Result<RunSettings> {
    let loaded_config = load_default_file_config()?;
    if let Some(path) = loaded_config.path.as_deref() {
        debug!(
            path = %path.display(),
            loaded = loaded_config.config.is_some(),
            "config file resolved"
        );
    }
    let env_inputs = EnvInputs {
        password: std::env::var(PASSWORD_ENV).ok().filter(|value| !value.is_empty()),
        home: env_var_non_empty_os("HOME").map(PathBuf::from),
        config_dir: resolve_config_dir(),
    };
    config_runtime::resolve_run_settings(
        cli,
        cli_sources,
        loaded_config.config.as_ref(),
        &env_inputs,
    )
}

#[cfg(test)]
mod tests {
    use super::resolve_config;
    use crate::app::config_runtime::CliValueSources;
    use crate::cli::Cli;
    use clap::Parser;
    use std::ffi::OsString;
    use tempfile::TempDir;

    struct RestoreEnv {
        key: &'static str,
        prev: Option<OsString>,
    }

    impl RestoreEnv {
        fn new(key: &'static str, prev: Option<OsString>) -> Self {
            Self { key, prev }
        }
    }

    impl Drop for RestoreEnv {
        fn drop(&mut self) {
            // SAFETY: tests restore the variable they changed.
            unsafe {
                match &self.prev {
                    Some(value) => std::env::set_var(self.key, value),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    /// Both cases share one test so the XDG_CONFIG_HOME changes never overlap.
    #[test]
    fn test_resolve_config_with_and_without_file() {
        let temp = TempDir::new().unwrap();
        let prev = std::env::var_os("XDG_CONFIG_HOME");
        // SAFETY: test isolates env change and restores on drop.
        unsafe {
            std::env::set_var("XDG_CONFIG_HOME", temp.path());
        }
        let _restore = RestoreEnv::new("XDG_CONFIG_HOME", prev);

        let cli = Cli::try_parse_from(["harvester", "download"]).unwrap();
        let resolved = resolve_config(&cli, &CliValueSources::default()).unwrap();
        assert_eq!(resolved.concurrency, 10, "default when no config");
        assert_eq!(
            resolved.gate.trial_marker,
            temp.path().join("harvester").join("first_use")
        );

        let dir = temp.path().join("harvester");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.toml"), "concurrency = 4\nruc = \"20100000001\"\n")
            .unwrap();
        let resolved = resolve_config(&cli, &CliValueSources::default()).unwrap();
        assert_eq!(resolved.concurrency, 4);
        assert_eq!(resolved.ruc.as_deref(), Some("20100000001"));

        std::fs::write(dir.join("config.toml"), "bogus = 1\n").unwrap();
        let err = resolve_config(&cli, &CliValueSources::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Unknown configuration key"));
    }
}
