use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};
use harvester_core::gate::DEFAULT_TRIAL_DAYS;
use harvester_core::listing::DEFAULT_PAGE_SIZE;
use harvester_core::portal::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use harvester_core::{HttpSettings, KindToggles, LoginPolicy};

use crate::app_config::{AccessGateSetting, FileConfig, VerbositySetting};
use crate::cli::{Cli, Command, FilterArgs};

pub(crate) const DEFAULT_LOGIN_URL: &str =
    "https://facturacalvicperu.com/fealvic/factura/BL/BL_principal.php";
pub(crate) const DEFAULT_LISTING_URL: &str =
    "https://facturacalvicperu.com/fealvic/factura/BL/BL_principal2.php";
pub(crate) const DEFAULT_BASE_URL: &str = "https://facturacalvicperu.com/fealvic/factura/BL/";
pub(crate) const DEFAULT_REFERER_URL: &str =
    "https://facturacalvicperu.com/fealvic/factura/inicio.php";

/// Directory created under `$HOME` when no output directory is configured.
pub(crate) const DEFAULT_OUTPUT_DIR_NAME: &str = "FacturasDescargadas";

const TRIAL_MARKER_FILE: &str = "first_use";

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) output_dir: bool,
    pub(crate) concurrency: bool,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Cli, CliValueSources) {
    let command = Cli::command();
    let matches = command.get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sources = sources_from_matches(&matches);
    (cli, sources)
}

pub(crate) fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    let mut sources = CliValueSources {
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
        ..CliValueSources::default()
    };
    match matches.subcommand() {
        Some(("download", sub)) => {
            sources.output_dir = is_commandline_value(sub, "output_dir");
            sources.concurrency = is_commandline_value(sub, "concurrency");
            sources.verbose |= is_commandline_value(sub, "verbose");
            sources.quiet |= is_commandline_value(sub, "quiet");
        }
        Some((_, sub)) => {
            sources.verbose |= is_commandline_value(sub, "verbose");
            sources.quiet |= is_commandline_value(sub, "quiet");
        }
        None => {}
    }
    sources
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Portal endpoint strings, validated later when the session is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EndpointSettings {
    pub(crate) login_url: String,
    pub(crate) listing_url: String,
    pub(crate) base_url: String,
    pub(crate) referer_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GateSettings {
    pub(crate) kind: AccessGateSetting,
    pub(crate) trial_days: u32,
    pub(crate) trial_marker: PathBuf,
    pub(crate) license_file: Option<PathBuf>,
    pub(crate) license_public_key: Option<String>,
}

/// Everything a run needs after merging CLI flags, the config file, and the
/// environment.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub(crate) endpoints: EndpointSettings,
    pub(crate) ruc: Option<String>,
    pub(crate) login: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) http: HttpSettings,
    pub(crate) login_policy: LoginPolicy,
    pub(crate) page_size: u32,
    pub(crate) concurrency: u8,
    pub(crate) toggles: KindToggles,
    pub(crate) output_dir: PathBuf,
    pub(crate) gate: GateSettings,
    pub(crate) verbose: u8,
    pub(crate) quiet: bool,
}

/// Environment values that feed into [`RunSettings`].
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvInputs {
    pub(crate) password: Option<String>,
    pub(crate) home: Option<PathBuf>,
    pub(crate) config_dir: Option<PathBuf>,
}

pub(crate) fn filters_of(cli: &Cli) -> &FilterArgs {
    match &cli.command {
        Command::Download(args) => &args.filters,
        Command::List(args) => &args.filters,
    }
}

pub(crate) fn resolve_run_settings(
    cli: &Cli,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
    env_inputs: &EnvInputs,
) -> Result<RunSettings> {
    let file = file_config.cloned().unwrap_or_default();
    let filters = filters_of(cli);

    let endpoints = EndpointSettings {
        login_url: file
            .login_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string()),
        listing_url: file
            .listing_url
            .clone()
            .unwrap_or_else(|| DEFAULT_LISTING_URL.to_string()),
        base_url: file
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        referer_url: Some(
            file.referer_url
                .clone()
                .unwrap_or_else(|| DEFAULT_REFERER_URL.to_string()),
        ),
    };

    let http = HttpSettings {
        connect_timeout_secs: file
            .connect_timeout_secs
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        read_timeout_secs: file.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
        verify_tls: !filters.insecure && file.verify_tls.unwrap_or(true),
    };

    let page_size = filters
        .page_size
        .or(file.page_size)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let (mut concurrency, mut output_dir, toggles) = match &cli.command {
        Command::Download(args) => (
            args.concurrency,
            args.output_dir.clone(),
            KindToggles {
                pdf: !args.no_pdf,
                xml: !args.no_xml,
            },
        ),
        Command::List(_) => (
            u8::try_from(harvester_core::DEFAULT_POOL_SIZE).unwrap_or(10),
            None,
            KindToggles::default(),
        ),
    };
    if !cli_sources.concurrency
        && let Some(value) = file.concurrency
    {
        concurrency = value;
    }
    if !cli_sources.output_dir
        && output_dir.is_none()
        && let Some(value) = &file.output_dir
    {
        output_dir = Some(value.clone());
    }
    let output_dir = output_dir.unwrap_or_else(|| default_output_dir(env_inputs.home.as_deref()));

    if !(1..=100).contains(&concurrency) {
        bail!("Invalid effective concurrency value: {concurrency}. Expected range: 1..=100");
    }

    let gate = GateSettings {
        kind: file.access_gate.unwrap_or_default(),
        trial_days: file.trial_days.unwrap_or(DEFAULT_TRIAL_DAYS),
        trial_marker: file.trial_marker.clone().unwrap_or_else(|| {
            env_inputs
                .config_dir
                .as_deref()
                .map_or_else(|| PathBuf::from(".harvester_first_use"), |dir| {
                    dir.join(TRIAL_MARKER_FILE)
                })
        }),
        license_file: file.license_file.clone(),
        license_public_key: file.license_public_key.clone(),
    };

    let (mut verbose, mut quiet) = (cli.verbose, cli.quiet);
    if !cli_sources.verbose
        && !cli_sources.quiet
        && let Some(verbosity) = file.verbosity
    {
        (verbose, quiet) = config_verbosity(verbosity);
    }

    Ok(RunSettings {
        endpoints,
        ruc: file.ruc.clone(),
        login: file.login.clone(),
        password: env_inputs.password.clone().or(file.password.clone()),
        http,
        login_policy: file.login_failure.unwrap_or_default(),
        page_size,
        concurrency,
        toggles,
        output_dir,
        gate,
        verbose,
        quiet,
    })
}

fn default_output_dir(home: Option<&Path>) -> PathBuf {
    home.map_or_else(
        || PathBuf::from(DEFAULT_OUTPUT_DIR_NAME),
        |home| home.join(DEFAULT_OUTPUT_DIR_NAME),
    )
}

fn config_verbosity(verbosity: VerbositySetting) -> (u8, bool) {
    match verbosity {
        VerbositySetting::Default => (0, false),
        VerbositySetting::Verbose => (1, false),
        VerbositySetting::Quiet => (0, true),
        VerbositySetting::Debug => (2, false),
    }
}

pub(crate) fn resolve_default_log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

pub(crate) fn should_force_cli_log_level(cli_sources: &CliValueSources) -> bool {
    cli_sources.verbose || cli_sources.quiet
}
