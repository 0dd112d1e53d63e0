use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harps_digger::app::{App, QueryOptions};
use harps_digger::client::HttpArchiveClient;
use harps_digger::config::Settings;
use harps_digger::coords::SkyPosition;
use harps_digger::domain::ProductKind;
use harps_digger::error::DiggerError;
use harps_digger::gaia::{GaiaCatalog, NoSources};
use harps_digger::output::JsonOutput;

/// Built-in demonstration query (tau Ceti) used when no coordinates are given.
const DEMO_RA_DEG: f64 = 26.017;
const DEMO_DEC_DEG: f64 = -15.9375;

#[derive(Parser)]
#[command(name = "harps-digger")]
#[command(about = "Dig archival HARPS radial velocities for TESS targets")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    query: QueryArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Cross-reference downloaded objects against the TOI table")]
    Summarize(SummarizeArgs),
}

#[derive(Args, Clone)]
struct QueryArgs {
    /// Query right ascension in decimal degrees
    #[arg(long)]
    ra: Option<f64>,

    /// Query declination in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    dec: Option<f64>,

    /// Data product to retrieve, by its exact catalog label
    #[arg(long)]
    product: Option<String>,

    /// Query radius in arcseconds
    #[arg(long)]
    radius: Option<f64>,

    /// Re-download the cached catalog and TOI tables
    #[arg(long)]
    clobber: bool,

    /// Output directory for downloaded products
    #[arg(long, short = 'o')]
    outdir: Option<Utf8PathBuf>,

    /// Cache directory for the flat CSV tables
    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    /// JSON settings file; flags given here still win
    #[arg(long)]
    settings: Option<Utf8PathBuf>,

    /// Persist time-series products as tagged CSV
    #[arg(long)]
    save_csv: bool,

    /// Download every product available for the matched object
    #[arg(long)]
    save_all: bool,

    /// Render a finder chart with a Gaia source overlay
    #[arg(long)]
    save_fov: bool,

    /// Print the machine-readable report as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Args, Clone)]
struct SummarizeArgs {
    #[arg(long)]
    outdir: Option<Utf8PathBuf>,

    #[arg(long)]
    cache_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    settings: Option<Utf8PathBuf>,

    #[arg(long)]
    clobber: bool,

    #[arg(long)]
    json: bool,

    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(digger) = report.downcast_ref::<DiggerError>() {
            return ExitCode::from(map_exit_code(digger));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DiggerError) -> u8 {
    match error {
        DiggerError::UnknownProduct(_)
        | DiggerError::ProductNotAvailable { .. }
        | DiggerError::CorruptCatalogEntry { .. }
        | DiggerError::CandidateNotFound(_)
        | DiggerError::NoDownloads(_) => 2,
        DiggerError::Http(_) | DiggerError::HttpStatus { .. } => 3,
        _ => 1,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Summarize(args)) => run_summarize(args),
        None => run_query(cli.query),
    }
}

fn build_settings(
    settings_file: Option<&Utf8PathBuf>,
    outdir: Option<Utf8PathBuf>,
    cache_dir: Option<Utf8PathBuf>,
    radius: Option<f64>,
) -> miette::Result<Settings> {
    let mut settings = match settings_file {
        Some(path) => Settings::from_file(path).into_diagnostic()?,
        None => Settings::new().into_diagnostic()?,
    };
    if let Some(outdir) = outdir {
        settings.output_dir = outdir;
    }
    if let Some(cache_dir) = cache_dir {
        settings.cache_dir = cache_dir;
    }
    if let Some(radius) = radius {
        settings.radius_arcsec = radius;
    }
    Ok(settings)
}

fn run_query(args: QueryArgs) -> miette::Result<()> {
    init_tracing(args.verbose);

    let position = match (args.ra, args.dec) {
        (Some(ra), Some(dec)) => SkyPosition::new(ra, dec).into_diagnostic()?,
        _ => {
            info!(
                ra = DEMO_RA_DEG,
                dec = DEMO_DEC_DEG,
                "no coordinates given, running the demonstration query"
            );
            SkyPosition::new(DEMO_RA_DEG, DEMO_DEC_DEG).into_diagnostic()?
        }
    };
    let product = args
        .product
        .as_deref()
        .map(str::parse::<ProductKind>)
        .transpose()
        .into_diagnostic()?;
    let settings = build_settings(args.settings.as_ref(), args.outdir, args.cache_dir, args.radius)?;

    let options = QueryOptions {
        position,
        product,
        clobber: args.clobber,
        save_csv: args.save_csv,
        save_all: args.save_all,
        save_fov: args.save_fov,
    };

    let client = HttpArchiveClient::new().into_diagnostic()?;
    let report = if args.save_fov {
        let overlay_client = HttpArchiveClient::new().into_diagnostic()?;
        let app = App::new(client, GaiaCatalog::new(&overlay_client), settings);
        app.query(&options).into_diagnostic()?
    } else {
        let app = App::new(client, NoSources, settings);
        app.query(&options).into_diagnostic()?
    };

    if args.json {
        JsonOutput::print_query(&report).into_diagnostic()?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_summarize(args: SummarizeArgs) -> miette::Result<()> {
    init_tracing(args.verbose);
    let settings = build_settings(args.settings.as_ref(), args.outdir, args.cache_dir, None)?;

    let client = HttpArchiveClient::new().into_diagnostic()?;
    let app = App::new(client, NoSources, settings);
    let summary = app.summarize(args.clobber).into_diagnostic()?;

    if args.json {
        JsonOutput::print_summary(&summary).into_diagnostic()?;
    } else {
        println!("cross-referenced {} objects", summary.rows().len());
        for row in summary.by_candidate() {
            println!(
                "  TOI {}  {}  nspectra={}  {}",
                row.toi,
                row.tic,
                row.nspectra,
                row.harps_name.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn print_report(report: &harps_digger::app::QueryReport) {
    if let Some(nearest) = &report.nearest {
        println!(
            "no object within {:.0}\" of {}; nearest is {} at {:.1}\"",
            report.radius_arcsec, report.query, nearest.target, nearest.separation_arcsec
        );
        println!("try an angular radius larger than {:.1}\"", nearest.separation_arcsec);
    } else {
        println!(
            "{} object(s) within {:.0}\" of {}: {}",
            report.matched.len(),
            report.radius_arcsec,
            report.query,
            report.matched.join(", ")
        );
    }
    if let Some(toi) = &report.toi {
        println!("candidate: TOI {toi}");
    }
    for outcome in &report.outcomes {
        match outcome {
            harps_digger::download::ProductOutcome::Saved { kind, path, rows } => match rows {
                Some(rows) => println!("saved: {path} ({rows} epochs) [{kind}]"),
                None => println!("saved: {path} [{kind}]"),
            },
            harps_digger::download::ProductOutcome::Parsed { kind, rows } => {
                println!("fetched {rows} epochs [{kind}] (not saved; use --save-csv)")
            }
            harps_digger::download::ProductOutcome::Skipped { kind } => {
                println!("not available: {kind}")
            }
            harps_digger::download::ProductOutcome::Failed { kind, url, message } => {
                match url {
                    Some(url) => println!("failed: {kind} ({url}): {message}"),
                    None => println!("failed: {kind}: {message}"),
                }
            }
        }
    }
    if let Some(chart) = &report.chart_path {
        println!("finder chart: {chart}");
    }
}
