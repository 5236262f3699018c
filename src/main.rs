//! CLI entry point for the harvester tool.

use std::process::ExitCode;

mod app;
mod app_config;
mod cli;
mod output;

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every listed document was downloaded (or nothing matched).
    Success,
    /// Fatal error, interruption, or every download failed.
    Failure,
    /// Some downloads succeeded and some failed.
    Partial,
    /// The startup access check refused to run.
    AccessDenied,
}

impl ProcessExit {
    fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
            Self::AccessDenied => 3,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_harvester().await {
        Ok(outcome) => ExitCode::from(outcome.code()),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::from(ProcessExit::Failure.code())
        }
    }
}
