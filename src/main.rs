use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use email_cleaner::categorizer::{bucket_for, check_invariants};
use email_cleaner::config::ServiceArgs;
use email_cleaner::models::{HistoryFilters, ResultStatus};
use email_cleaner::upload::estimate_credits;
use email_cleaner::{
    AppError, CategoryType, ClientBackend, Config, FixtureValidationClient, JobSnapshot, JobState,
    ProgressTracker, ReportBrowser, ValidationClient, ValidationResult, build_config, server,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Validate, categorize and export bulk email lists", long_about = None)]
struct Cli {
    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options controlling which slice of a result is printed or exported.
#[derive(Args, Debug)]
struct ViewArgs {
    /// Category to show (valid, invalid, risky, disposable, spamTraps)
    #[arg(long, default_value = "valid")]
    category: CategoryType,

    /// Case-insensitive filter on the shown category
    #[arg(long, default_value = "")]
    search: String,

    /// Page to show (10 addresses per page)
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Write <category>-emails.txt into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Export every category instead of only the shown one
    #[arg(long, default_value_t = false)]
    export_all: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a CSV/Excel file or a pasted list of addresses
    Validate {
        /// Path to the CSV or Excel file
        #[arg(required_unless_present = "text")]
        file: Option<PathBuf>,

        /// Addresses separated by commas or newlines, instead of a file
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Save the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Validate a single address
    Check {
        /// The address to check
        email: String,
    },
    /// Browse a result previously saved with `validate --output`
    Report {
        /// Path to the saved result JSON
        result: PathBuf,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// List past validations
    History {
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Only results with this status (completed, processing, failed)
        #[arg(long, value_parser = parse_status)]
        status: Option<ResultStatus>,

        #[arg(long)]
        search: Option<String>,

        #[arg(long)]
        date_from: Option<String>,

        #[arg(long)]
        date_to: Option<String>,
    },
    /// Start a local mock of the validation service
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Delay responses by the configured fixture latency
        #[arg(long, default_value_t = false)]
        simulate_latency: bool,
    },
}

fn parse_status(s: &str) -> std::result::Result<ResultStatus, String> {
    match s {
        "completed" => Ok(ResultStatus::Completed),
        "processing" => Ok(ResultStatus::Processing),
        "failed" => Ok(ResultStatus::Failed),
        other => Err(format!("unknown status '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        // Recoverable input and service errors get a plain message, not a report
        if let Some(app_err) = err.downcast_ref::<AppError>() {
            if app_err.is_user_facing() {
                eprintln!("Error: {}", app_err);
                std::process::exit(1);
            }
        }
        return Err(err);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = build_config(&cli.service)?;

    match cli.command {
        Commands::Validate {
            file,
            text,
            output,
            view,
        } => run_validate(&config, file, text, output, view).await?,
        Commands::Check { email } => run_check(&config, &email).await?,
        Commands::Report { result, view } => {
            let content = std::fs::read_to_string(&result)
                .with_context(|| format!("Failed to read result file {}", result.display()))?;
            let parsed: ValidationResult = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse result file {}", result.display()))?;
            if let Err(violation) = check_invariants(&parsed, None) {
                tracing::warn!("Saved result {} is inconsistent: {}", parsed.id, violation);
            }
            show_report(&config, parsed, view)?;
        }
        Commands::History {
            page,
            status,
            search,
            date_from,
            date_to,
        } => {
            let filters = HistoryFilters {
                status,
                date_from,
                date_to,
                search,
            };
            run_history(&config, page, &filters).await?;
        }
        Commands::Serve {
            port,
            simulate_latency,
        } => {
            let client = if simulate_latency {
                FixtureValidationClient::from_config(&config)
            } else {
                FixtureValidationClient::default()
            };
            info!("Starting mock validation service on port {}", port);
            server::start_mock_server(port, Arc::new(client)).await;
        }
    }

    Ok(())
}

async fn run_validate(
    config: &Config,
    file: Option<PathBuf>,
    text: Option<String>,
    output: Option<PathBuf>,
    view: ViewArgs,
) -> Result<()> {
    let client = ClientBackend::from_config(config)?;
    let mut tracker = ProgressTracker::from_config(config);

    let count = match (&file, &text) {
        (Some(path), _) => {
            if let Ok(meta) = std::fs::metadata(path) {
                info!(
                    "{} is roughly {} emails; about {} credits will be needed",
                    path.display(),
                    estimate_credits(meta.len()),
                    estimate_credits(meta.len())
                );
            }
            tracker.load_file(path).await?
        }
        (None, Some(text)) => tracker.load_direct(text)?,
        (None, None) => anyhow::bail!("Provide a file or --text"),
    };
    info!("Submitting {} addresses for validation", count);

    let bar = spawn_progress_bar(tracker.subscribe());
    let outcome = tracker.submit(&client).await;
    bar.await.context("Progress display task failed")?;
    let result = outcome?;

    if let Some(path) = output {
        let data = serde_json::to_string_pretty(&result)?;
        std::fs::write(&path, data)
            .with_context(|| format!("Failed to write result to {}", path.display()))?;
        info!("Wrote result {} to {}", result.id, path.display());
    }

    show_report(config, result, view)
}

/// Renders tracker snapshots until the job reaches a terminal state.
fn spawn_progress_bar(mut updates: watch::Receiver<JobSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let progress_bar = ProgressBar::new(100);
        progress_bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );

        while updates.changed().await.is_ok() {
            let snapshot = *updates.borrow_and_update();
            progress_bar.set_position(u64::from(snapshot.progress));
            progress_bar.set_message(snapshot.state.to_string());
            match snapshot.state {
                JobState::Completed => {
                    progress_bar.finish_with_message("Validation complete");
                    break;
                }
                JobState::Failed => {
                    progress_bar.abandon_with_message("Validation failed");
                    break;
                }
                _ => {}
            }
        }
    })
}

async fn run_check(config: &Config, email: &str) -> Result<()> {
    let client = ClientBackend::from_config(config)?;
    let result = client.submit_single(email).await?;

    let category = CategoryType::ALL
        .into_iter()
        .find(|c| bucket_for(&result, *c).iter().any(|a| a == email));

    match category {
        Some(category) => {
            let descriptor = category.descriptor();
            println!("{}: {} ({})", email, descriptor.label, descriptor.description);
        }
        None => println!("{}: not classified by the service", email),
    }
    println!("Credits used: {}", result.credits_used);
    Ok(())
}

async fn run_history(config: &Config, page: usize, filters: &HistoryFilters) -> Result<()> {
    let client = ClientBackend::from_config(config)?;
    let history = client.fetch_history(page, filters).await?;

    println!(
        "Page {} of {} ({} validations total)",
        page, history.pages, history.total
    );
    for entry in &history.results {
        let date = entry
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<10} {:<17} {:<24} {:>6} emails {:>6} valid  {:?}",
            entry.id,
            date,
            entry.file_name.as_deref().unwrap_or("-"),
            entry.total_emails,
            entry.valid.len(),
            entry.status
        );
    }
    Ok(())
}

fn show_report(config: &Config, result: ValidationResult, view: ViewArgs) -> Result<()> {
    let mut browser = ReportBrowser::new(result);
    browser.select_category(view.category);
    browser.set_search(view.search);
    browser.set_page(view.page);

    print_summary(&browser);
    print_rows(&browser);

    if let Some(dir) = view.export_dir.as_ref().or(config.export_dir.as_ref()) {
        let categories: Vec<CategoryType> = if view.export_all {
            CategoryType::ALL.to_vec()
        } else {
            vec![view.category]
        };
        export(&browser, dir, &categories)?;
    }
    Ok(())
}

fn print_summary(browser: &ReportBrowser) {
    let result = browser.result();
    let stats = browser.stats();

    println!(
        "Validation {} ({}): {} emails, {} credits used",
        result.id,
        result.file_name.as_deref().unwrap_or("direct input"),
        result.total_emails,
        result.credits_used
    );
    for category in CategoryType::ALL {
        println!(
            "  {:<18} {:>7} {:>6.1}%",
            category.descriptor().label,
            stats.count(category),
            browser.percent(category)
        );
    }
    let unclassified = stats.unclassified(result.total_emails);
    if unclassified > 0 {
        println!("  {:<18} {:>7}", "Unclassified", unclassified);
    }
}

fn print_rows(browser: &ReportBrowser) {
    let state = browser.state();
    let rows = browser.rows();
    let label = state.selected_category.descriptor().label;

    println!();
    if state.search_text.is_empty() {
        println!("{}: page {}/{}", label, rows.page, rows.total_pages);
    } else {
        println!(
            "{}: page {}/{} ({} matching \"{}\")",
            label, rows.page, rows.total_pages, rows.total_filtered, state.search_text
        );
    }
    if rows.rows.is_empty() {
        println!("  (no addresses)");
    }
    for address in rows.rows {
        println!("  {}", address);
    }
}

fn export(browser: &ReportBrowser, dir: &Path, categories: &[CategoryType]) -> Result<()> {
    for category in categories {
        let path = browser
            .export_to_dir(dir, *category)
            .with_context(|| format!("Failed to export {} emails to {}", category, dir.display()))?;
        println!("Saved {}", path.display());
    }
    Ok(())
}
