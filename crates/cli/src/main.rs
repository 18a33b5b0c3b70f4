use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volcast_core::domain::instrument::Instrument;
use volcast_core::pages::format::{format_log, format_volume};
use volcast_core::pages::{features, predict, Services};
use volcast_core::time::us_market::resolve_target_date;

#[derive(Debug, Parser)]
#[command(name = "volcast")]
struct Args {
    /// Print results as JSON instead of a text table.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the feature row for a date (2010-01-01..=2025-12-31).
    Features {
        /// YYYY-MM-DD. Defaults to 2025-04-25.
        #[arg(long)]
        date: Option<String>,

        #[arg(long, default_value = "SPY")]
        instrument: Instrument,
    },

    /// Predict trading volume for SPY, SSO and UPRO on a date.
    Predict {
        /// YYYY-MM-DD. Defaults to 2025-04-25.
        #[arg(long)]
        date: Option<String>,
    },

    /// Render the predicted-vs-actual chart for one instrument as SVG.
    Chart {
        #[arg(long)]
        instrument: Instrument,

        /// Output file. Writes to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = volcast_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let services = Services::from_settings(&settings)?;

    let result = run(&services, args.command, args.json).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        let message = format!("{err:#}");
        tracing::error!(error = %message, "command failed");
    }
    result
}

async fn run(services: &Services, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Features { date, instrument } => {
            let date = resolve_target_date(date.as_deref())?;
            let table = features::lookup_features(services, date, instrument)
                .await
                .context(features::ERROR_PREFIX)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&table)?);
            } else {
                println!("{} {}", table.date, table.instrument);
                for c in &table.columns {
                    println!("  {:<28} {}", c.name, c.value);
                }
            }
        }
        Command::Predict { date } => {
            let date = resolve_target_date(date.as_deref())?;
            let set = predict::predict_volumes(services, date).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&set)?);
            } else {
                println!("{:<6} {:>24} {:>20}", "", "log(volume+1)", "volume");
                for p in &set.predictions {
                    println!(
                        "{:<6} {:>24} {:>20}",
                        p.instrument.symbol(),
                        format_log(p.pred_log),
                        format_volume(p.pred_vol)
                    );
                }
            }
        }
        Command::Chart { instrument, out } => {
            let svg = services.charts.render(instrument).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, svg)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(%instrument, path = %path.display(), "chart written");
                }
                None => println!("{svg}"),
            }
        }
    }
    Ok(())
}

fn init_sentry(settings: &volcast_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
