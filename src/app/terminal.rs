//! Terminal capabilities and tracing setup for the binary.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// How the run talks to the terminal, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TerminalProfile {
    pub(crate) ansi: bool,
    pub(crate) progress_bar: bool,
}

impl TerminalProfile {
    /// Reads `NO_COLOR`, `TERM` and whether stderr is a TTY.
    pub(crate) fn detect(no_color_flag: bool, quiet: bool) -> Self {
        let no_color_env = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
        let dumb = std::env::var("TERM").is_ok_and(|value| value.eq_ignore_ascii_case("dumb"));
        Self::from_parts(
            no_color_flag || no_color_env,
            dumb,
            std::io::stderr().is_terminal(),
            quiet,
        )
    }

    fn from_parts(no_color: bool, dumb: bool, stderr_tty: bool, quiet: bool) -> Self {
        Self {
            ansi: !no_color && !dumb,
            progress_bar: stderr_tty && !dumb && !quiet,
        }
    }
}

/// Installs the stderr subscriber. `RUST_LOG` applies unless the level was
/// forced by `-v`/`-q`.
pub(crate) fn init_tracing(default_level: &str, force_cli_level: bool, profile: TerminalProfile) {
    let filter = if force_cli_level {
        EnvFilter::new(default_level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(profile.ansi)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
