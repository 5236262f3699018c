//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harvester_core::DEFAULT_POOL_SIZE;

/// Download invoice documents from an electronic invoicing portal.
///
/// Harvester logs into the portal, pages through every document emitted in
/// a date range, and saves each document's PDF and XML renditions as
/// `{series}-{number}.pdf|.xml`.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download PDF and XML documents for a date range
    Download(DownloadArgs),

    /// List documents for a date range and export them to a CSV spreadsheet
    List(ListArgs),
}

/// Listing filters shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// First emission date, dd/mm/yyyy
    #[arg(long = "from", value_name = "DD/MM/YYYY")]
    pub from: Option<String>,

    /// Last emission date, dd/mm/yyyy
    #[arg(long = "to", value_name = "DD/MM/YYYY")]
    pub to: Option<String>,

    /// Only documents of this series (e.g. F001)
    #[arg(long)]
    pub series: Option<String>,

    /// Only documents issued to this customer tax id
    #[arg(long)]
    pub ruc: Option<String>,

    /// Lowest document number
    #[arg(long, value_name = "N")]
    pub number_from: Option<String>,

    /// Highest document number
    #[arg(long, value_name = "N")]
    pub number_to: Option<String>,

    /// Rows requested per listing page (1-1000)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub page_size: Option<u32>,

    /// Skip TLS certificate verification for the portal
    #[arg(long)]
    pub insecure: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Do not download PDF renditions
    #[arg(long)]
    pub no_pdf: bool,

    /// Do not download XML documents
    #[arg(long)]
    pub no_xml: bool,

    /// Output directory (default: $HOME/FacturasDescargadas)
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_POOL_SIZE as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// CSV file to write
    #[arg(long, value_name = "FILE.csv")]
    pub export: PathBuf,
}
