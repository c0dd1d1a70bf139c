//! EV Insights - command line front end.
//!
//! Every subcommand runs against one `Dashboard`, which loads the sales data
//! and the forecast model once at startup.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ev_insights::app::{ModelStatus, PREDICTION_YEARS};
use ev_insights::charts::ImageFormat;
use ev_insights::chat::{typewrite, ChatSession, Role};
use ev_insights::stats::format_count;
use ev_insights::{AppConfig, Dashboard, ForecastInput};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Png,
    Svg,
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ImageFormat::Png,
            Format::Svg => ImageFormat::Svg,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Headline figures for the loaded dataset
    Summary,

    /// Answer a single question about the data
    Ask {
        query: Vec<String>,
    },

    /// Interactive question and answer session
    Chat,

    /// List the values accepted by `predict`
    Options,

    /// Forecast EV sales
    Predict {
        #[arg(long)]
        region: String,
        #[arg(long, default_value = "Cars")]
        mode: String,
        #[arg(long, default_value = "BEV")]
        powertrain: String,
        #[arg(long, default_value = "Historical")]
        category: String,
        #[arg(long, value_parser = clap::value_parser!(i32).range(2024..=2040))]
        year: i32,
    },

    /// Train the forecast model and save the bundle
    Train,

    /// Render the sales trend and top region charts
    Plot {
        #[arg(long, default_value = "charts")]
        out_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Png)]
        format: Format,
    },

    /// Summarise and chart an arbitrary sales CSV
    Analyze {
        csv: PathBuf,
        #[arg(long, default_value = "charts")]
        out_dir: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Png)]
        format: Format,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "ev-insights")]
#[command(about = "Chat-style answers, charts and forecasts over historical EV sales")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sales CSV, overrides the configured path
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Model bundle, overrides the configured path
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(data) = cli.data {
        config.data_path = data;
    }
    if let Some(model) = cli.model {
        config.model_path = model;
    }

    let mut dashboard = Dashboard::initialise(config);

    match cli.command {
        Commands::Summary => print_summary(&dashboard),
        Commands::Ask { query } => {
            let query = query.join(" ");
            if query.trim().is_empty() {
                bail!("Ask a question, for example: ev-insights ask \"top 5 regions\"");
            }
            println!("{}", dashboard.answer(&query));
        }
        Commands::Chat => run_chat(&dashboard)?,
        Commands::Options => print_options(&dashboard),
        Commands::Predict {
            region,
            mode,
            powertrain,
            category,
            year,
        } => {
            let input = ForecastInput {
                region,
                mode,
                powertrain,
                category,
                year,
            };
            let estimate = dashboard.predict(&input)?;
            println!(
                "Predicted EV sales for {} in {}: {} vehicles",
                input.region,
                input.year,
                format_count(estimate)
            );
        }
        Commands::Train => {
            let report = dashboard.train().context("Training failed")?;
            println!(
                "Trained on {} rows ({} held out), saved to {}",
                report.train_rows,
                report.holdout_rows,
                dashboard.config().model_path.display()
            );
            if let Some(m) = report.holdout {
                println!("Holdout (log space): RMSE {:.4}, MAE {:.4}, R² {:.4}", m.rmse, m.mae, m.r2);
            }
        }
        Commands::Plot { out_dir, format } => {
            let charts = dashboard.render_charts(&out_dir, format.into())?;
            print_paths(&charts);
        }
        Commands::Analyze { csv, out_dir, format } => {
            let analysis = dashboard
                .analyze_upload(&csv, &out_dir, format.into())
                .with_context(|| format!("Could not analyse {}", csv.display()))?;
            println!("Rows: {}", analysis.summary.records);
            println!("Regions: {}", analysis.summary.regions);
            println!("Latest year: {}", analysis.summary.latest_year_label());
            print_paths(&analysis.charts);
        }
    }

    Ok(())
}

fn print_summary(dashboard: &Dashboard) {
    let summary = dashboard.summary();
    let regions = if dashboard.analysis().is_some() {
        summary.regions.to_string()
    } else {
        "N/A".to_string()
    };
    println!("Regions analysed: {regions}");
    println!("Latest data year: {}", summary.latest_year_label());
    println!("Records: {}", summary.records);
    match dashboard.model_status() {
        ModelStatus::Loaded(model) => println!("Forecast model: loaded from {}", model.path().display()),
        ModelStatus::Unavailable(reason) => println!("Forecast model: unavailable ({reason})"),
    }
}

fn print_options(dashboard: &Dashboard) {
    let Some(options) = dashboard.prediction_options() else {
        println!("The data could not be loaded.");
        return;
    };
    println!("Regions: {}", options.regions.join(", "));
    println!("Modes: {}", options.modes.join(", "));
    println!("Powertrains: {}", options.powertrains.join(", "));
    println!("Categories: {}", options.categories.join(", "));
    println!("Years: {}-{}", PREDICTION_YEARS.start(), PREDICTION_YEARS.end());
}

fn print_paths(paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("No charts written: no \"EV sales\" rows to plot.");
    }
    for path in paths {
        println!("Wrote {}", path.display());
    }
}

fn run_chat(dashboard: &Dashboard) -> Result<()> {
    let delay = Duration::from_millis(dashboard.config().typing_delay_ms);
    let mut session = ChatSession::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();

    for message in session.history() {
        if message.role == Role::Assistant {
            typewrite(&mut stdout, &message.content, delay)?;
            writeln!(stdout)?;
        }
    }
    info!("Chat started, type 'exit' to leave");

    loop {
        write!(stdout, "\n> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        let reply = session.ask(query, dashboard.analysis());
        typewrite(&mut stdout, &reply.content, delay)?;
        writeln!(stdout)?;
    }
    Ok(())
}
