use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use harvester_core::gate::DenyReason;
use harvester_core::{
    AccessGate, CancelToken, Credentials, GateDecision, HarvestOptions, ListingFilters, OpenGate,
    PageQuery, PortalEndpoints, PortalSession, SignedLicenseGate, TrialGate, export_rows,
    fetch_all_rows, harvest,
};
use tracing::{debug, error, info, warn};

use crate::app::config_runtime::{self, GateSettings, RunSettings};
use crate::app::{config_manager, exit_handler, progress_manager, terminal};
use crate::app_config::AccessGateSetting;
use crate::cli::{Command, FilterArgs};
use crate::{ProcessExit, output};

pub(crate) async fn run_harvester() -> Result<ProcessExit> {
    let (cli, cli_sources) = config_runtime::parse_cli_with_sources();
    let settings = config_manager::resolve_config(&cli, &cli_sources)?;

    let default_level = config_runtime::resolve_default_log_level(settings.verbose, settings.quiet);
    let force_cli_log_level = config_runtime::should_force_cli_log_level(&cli_sources);
    let profile = terminal::TerminalProfile::detect(cli.no_color, settings.quiet);
    terminal::init_tracing(default_level, force_cli_log_level, profile);

    debug!(?cli, "CLI arguments parsed");
    info!("Harvester starting");

    if let Err(reason) = check_access(&settings.gate) {
        error!(reason = %reason, "access denied");
        eprintln!("Access denied: {reason}");
        return Ok(ProcessExit::AccessDenied);
    }

    let query = build_query(config_runtime::filters_of(&cli), settings.page_size)?;
    let credentials = build_credentials(&settings)?;
    let session = build_session(&settings)?;
    session
        .authenticate(&credentials, settings.login_policy)
        .await
        .context("Portal login failed")?;

    let cancel = CancelToken::new();
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_signal.cancel();
        }
    });

    match &cli.command {
        Command::Download(_) => {
            run_download(&session, &query, &settings, profile, &cancel).await
        }
        Command::List(args) => run_list(&session, &query, &args.export, &cancel).await,
    }
}

async fn run_download(
    session: &PortalSession,
    query: &PageQuery,
    settings: &RunSettings,
    profile: terminal::TerminalProfile,
    cancel: &CancelToken,
) -> Result<ProcessExit> {
    let options = HarvestOptions {
        base_url: session.endpoints().base().clone(),
        toggles: settings.toggles,
        output_dir: settings.output_dir.clone(),
        pool_size: usize::from(settings.concurrency),
    };

    let reporter = Arc::new(progress_manager::ProgressReporter::new(profile.progress_bar));

    let report = harvest(session, query, &options, cancel, reporter.clone()).await;
    reporter.finish();
    let report = report.with_context(|| {
        format!(
            "Cannot download into '{}'",
            settings.output_dir.display()
        )
    })?;

    output::print_harvest_summary(&report, &settings.output_dir);

    if report.cancelled {
        warn!("Interrupted by user");
    }
    Ok(exit_handler::harvest_outcome(&report))
}

async fn run_list(
    session: &PortalSession,
    query: &PageQuery,
    export_path: &Path,
    cancel: &CancelToken,
) -> Result<ProcessExit> {
    let rows = fetch_all_rows(session, query, cancel).await;
    if cancel.is_cancelled() {
        warn!("Interrupted by user; spreadsheet not written");
        return Ok(ProcessExit::Failure);
    }
    let written = export_rows(&rows, export_path)?;
    output::print_export_summary(written, export_path);
    Ok(ProcessExit::Success)
}

fn check_access(gate: &GateSettings) -> Result<(), String> {
    let decision = match gate.kind {
        AccessGateSetting::Open => OpenGate.check(),
        AccessGateSetting::Trial => TrialGate::new(
            &gate.trial_marker,
            gate.trial_days,
            chrono::Local::now().date_naive(),
        )
        .check(),
        AccessGateSetting::License => {
            let (Some(file), Some(key)) = (&gate.license_file, &gate.license_public_key) else {
                return Err("license_file and license_public_key must be configured".to_string());
            };
            SignedLicenseGate::from_file(file, key, chrono::Utc::now())
                .and_then(|license| license.check())
        }
    };

    match decision {
        Ok(GateDecision::Granted { days_left }) => {
            if let Some(days_left) = days_left {
                info!(days_left, "access granted");
            }
            Ok(())
        }
        Ok(GateDecision::Denied(reason)) => Err(describe_denial(&reason)),
        Err(error) => Err(error.to_string()),
    }
}

fn describe_denial(reason: &DenyReason) -> String {
    match reason {
        DenyReason::TrialExpired { .. } => format!("{reason}; a license is required"),
        _ => reason.to_string(),
    }
}

pub(crate) fn build_query(filters: &FilterArgs, page_size: u32) -> Result<PageQuery> {
    let mut listing = ListingFilters::new(
        filters.from.as_deref().unwrap_or_default(),
        filters.to.as_deref().unwrap_or_default(),
    )?;
    if let Some(series) = &filters.series {
        listing = listing.with_series(series);
    }
    if let Some(ruc) = &filters.ruc {
        listing = listing.with_ruc(ruc);
    }
    if filters.number_from.is_some() || filters.number_to.is_some() {
        listing = listing.with_number_range(
            filters.number_from.clone().unwrap_or_default(),
            filters.number_to.clone().unwrap_or_default(),
        );
    }
    Ok(PageQuery::new(listing, page_size)?)
}

fn build_credentials(settings: &RunSettings) -> Result<Credentials> {
    let missing = |key: &str| {
        anyhow!("Missing `{key}`: set it in the config file before connecting to the portal")
    };
    let ruc = settings.ruc.as_deref().ok_or_else(|| missing("ruc"))?;
    let login = settings.login.as_deref().ok_or_else(|| missing("login"))?;
    let password = settings.password.as_deref().ok_or_else(|| {
        anyhow!(
            "Missing password: set `password` in the config file or {}",
            config_manager::PASSWORD_ENV
        )
    })?;
    Ok(Credentials::new(ruc, login, password))
}

fn build_session(settings: &RunSettings) -> Result<PortalSession> {
    let endpoints = &settings.endpoints;
    let endpoints = PortalEndpoints::new(
        &endpoints.login_url,
        &endpoints.listing_url,
        &endpoints.base_url,
        endpoints.referer_url.as_deref(),
    )
    .context("Invalid portal endpoint configuration")?;
    Ok(PortalSession::new(endpoints, &settings.http)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use harvester_core::QueryError;

    use crate::cli::Cli;

    fn filters(args: &[&str]) -> FilterArgs {
        let mut argv = vec!["harvester", "download"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        config_runtime::filters_of(&cli).clone()
    }

    #[test]
    fn test_build_query_valid_range() {
        let query = build_query(
            &filters(&["--from", "01/09/2025", "--to", "30/09/2025", "--series", "F001"]),
            50,
        )
        .unwrap();
        assert_eq!(query.page_size(), 50);
        assert_eq!(query.page(), 1);
    }

    #[test]
    fn test_build_query_missing_dates() {
        let err = build_query(&filters(&["--to", "30/09/2025"]), 50).unwrap_err();
        assert_eq!(
            err.downcast_ref::<QueryError>(),
            Some(&QueryError::MissingDate { field: "start" })
        );
    }

    #[test]
    fn test_build_query_reversed_range() {
        let err = build_query(&filters(&["--from", "02/09/2025", "--to", "01/09/2025"]), 50)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueryError>(),
            Some(QueryError::DateRangeReversed { .. })
        ));
    }

    #[test]
    fn test_open_gate_setting_allows_access() {
        let gate = GateSettings {
            kind: AccessGateSetting::Open,
            trial_days: 15,
            trial_marker: std::path::PathBuf::from("/nonexistent/first_use"),
            license_file: None,
            license_public_key: None,
        };
        assert!(check_access(&gate).is_ok());
    }

    #[test]
    fn test_license_gate_without_file_is_denied() {
        let gate = GateSettings {
            kind: AccessGateSetting::License,
            trial_days: 15,
            trial_marker: std::path::PathBuf::from("first_use"),
            license_file: None,
            license_public_key: None,
        };
        assert!(check_access(&gate).is_err());
    }
}
