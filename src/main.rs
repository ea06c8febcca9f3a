//! Scanwarden - phased web security scan CLI

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use scanwarden::config::{self, AppConfig};
use scanwarden::fingerprint::Fingerprinter;
use scanwarden::models::{RunState, Severity};
use scanwarden::orchestrator::{
    cancel_pair, ConnectionNegotiator, ScanPhaseController, ZapConnector,
};
use scanwarden::report::{self, Frameworks, PdfConverter, ReportData, ReportFormat};
use scanwarden::storage::{self, JsonFileStore, ScanRecord, ScanStore};

/// Scanwarden - phased web security scanning through OWASP ZAP
#[derive(Parser)]
#[command(name = "scanwarden", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Html,
    Pdf,
    Json,
}

impl From<FormatArg> for ReportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Html => ReportFormat::Html,
            FormatArg::Pdf => ReportFormat::Pdf,
            FormatArg::Json => ReportFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scan against a target
    Scan {
        /// Target URL (prompted for when omitted)
        #[arg(short, long)]
        target: Option<String>,

        /// Report format
        #[arg(short, long, value_enum, default_value = "pdf")]
        format: FormatArg,

        /// Store the scan record after the report is written
        #[arg(long, alias = "store-db")]
        store: bool,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum findings shown in the report
        #[arg(long)]
        max_findings: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-render the report of a stored scan record
    Report {
        /// Path to the stored record (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Report format
        #[arg(short, long, value_enum, default_value = "html")]
        format: FormatArg,

        /// Output path without extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum findings shown in the report
        #[arg(long)]
        max_findings: Option<usize>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        "scanwarden=debug"
    } else {
        "scanwarden=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();
}

fn load_app_config(path: Option<&Path>) -> scanwarden::error::Result<AppConfig> {
    let mut app = match path {
        Some(path) => config::load_config(path)?,
        None => {
            let default_path = Path::new("config/default.toml");
            if default_path.exists() {
                config::load_config(default_path)?
            } else {
                AppConfig::default()
            }
        }
    };
    app.apply_env();
    Ok(app)
}

fn prompt_target() -> io::Result<String> {
    print!("Please enter the target URL to scan: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_banner() {
    let banner = r#"
    ╔═══════════════════════════════════════╗
    ║  SCANWARDEN                           ║
    ║  Phased Web Security Scanning         ║
    ╚═══════════════════════════════════════╝
    "#;
    println!("{}", banner.cyan());
}

fn print_summary(data: &ReportData) {
    let severities = [
        (Severity::High, "High"),
        (Severity::Medium, "Medium"),
        (Severity::Low, "Low"),
        (Severity::Informational, "Informational"),
    ];

    println!("\n{}", "  Scan Summary".bold());
    println!("  {}", "─".repeat(35));

    let mut builder = Builder::default();
    builder.push_record(["Severity", "Count"]);
    for (severity, label) in &severities {
        builder.push_record([label.to_string(), data.summary.count(*severity).to_string()]);
    }
    builder.push_record(["Total".to_string(), data.summary.total().to_string()]);

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "\n  {} {} {} {}",
        format!("{} High", data.summary.high()).bright_red().bold(),
        format!("{} Medium", data.summary.medium()).yellow(),
        format!("{} Low", data.summary.low()).blue(),
        format!("{} Informational", data.summary.informational()).white(),
    );

    for note in data.summary.phase_notes() {
        println!("  {} {}", "Note:".yellow().bold(), note);
    }
    if let Some(note) = data.summary.note() {
        println!("  {} {}", "Note:".yellow().bold(), note);
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            target,
            format,
            store,
            config: config_path,
            max_findings,
            verbose,
        } => {
            init_tracing(verbose);
            print_banner();

            let mut app = load_app_config(config_path.as_deref())?;
            if let Some(max) = max_findings {
                app.report.max_findings = max;
            }

            let target = match target {
                Some(t) => t.trim().to_string(),
                None => prompt_target()?,
            };
            if target.is_empty() {
                eprintln!("  {} No target URL provided", "Error:".red().bold());
                std::process::exit(1);
            }

            let format = ReportFormat::from(format);
            let stem = report::output_stem(&app.report.output_dir, &target, chrono::Local::now());

            println!("  {} {}", "Target:".bold(), target.green());
            println!("  {} {}", "Engine:".bold(), app.engine.endpoint.cyan());
            println!(
                "  {} {}.{}\n",
                "Output:".bold(),
                stem.display().to_string().cyan(),
                format
            );

            let connector = ZapConnector::new(app.engine.endpoint_url()?, app.engine.request_timeout);
            let negotiator = ConnectionNegotiator::new(connector, app.auth_strategies());
            let controller = ScanPhaseController::new(negotiator, app.phases);

            let (handle, mut signal) = cancel_pair();
            if let Some(limit) = app.run_deadline {
                signal = signal.with_deadline(tokio::time::Instant::now() + limit);
            }
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, stopping the scan");
                    handle.cancel();
                }
            });

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("  {spinner:.cyan} {elapsed_precise} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message("Fingerprinting and scanning...");
            spinner.enable_steady_tick(Duration::from_millis(120));

            let fingerprinter = Fingerprinter::from_config(&app.fingerprint);
            let (fingerprint, result) = tokio::join!(
                fingerprinter.fingerprint_until(&target, &signal),
                controller.run(&target, &signal)
            );
            spinner.finish_and_clear();

            if let Err(ref e) = fingerprint {
                warn!("Continuing without technology detection: {e}");
            }
            let frameworks = Frameworks::from(fingerprint);

            match (&result.state, &result.error) {
                (RunState::Failed, Some(err)) => {
                    println!("  {} {}", "Scan issues:".red().bold(), err);
                    println!("  Continuing with available results...");
                }
                _ => println!(
                    "  {} {} ({} findings)",
                    "Scan finished:".bold(),
                    result.state.to_string().green(),
                    result.findings.len()
                ),
            }

            let data = ReportData::assemble(&result, frameworks.clone(), app.report.max_findings);
            print_summary(&data);

            std::fs::create_dir_all(&app.report.output_dir)?;
            let converter = PdfConverter::from_config(&app.report);
            let report_path = report::render(&data, &stem, format, &converter).await?;

            if store {
                let store = JsonFileStore::new(&app.storage_dir);
                match store.store(&ScanRecord::new(result, frameworks, &report_path)) {
                    Ok(id) => println!("  {} {}", "Stored scan record:".bold(), id.cyan()),
                    Err(e) => error!("Could not store scan record (report kept): {e}"),
                }
            }

            println!(
                "\n  {} {}",
                "Report saved to:".bold(),
                report_path.display().to_string().green()
            );
        }

        Commands::Report {
            input,
            format,
            output,
            config: config_path,
            max_findings,
        } => {
            init_tracing(false);
            print_banner();

            let app = load_app_config(config_path.as_deref())?;
            let record = storage::load_record(&input)?;
            let max = max_findings.unwrap_or(app.report.max_findings);

            let data = ReportData::assemble(&record.result, record.frameworks.clone(), max);
            let stem = output.unwrap_or_else(|| {
                report::output_stem(&app.report.output_dir, &record.target, record.timestamp)
            });
            let converter = PdfConverter::from_config(&app.report);
            let report_path =
                report::render(&data, &stem, ReportFormat::from(format), &converter).await?;

            print_summary(&data);
            println!(
                "\n  {} {}",
                "Report saved to:".bold(),
                report_path.display().to_string().green()
            );
        }
    }

    Ok(())
}
