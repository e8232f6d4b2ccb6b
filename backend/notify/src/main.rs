use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notify::{attendance_summary, current_month, deliver, payment_reminder, today_formatted};
use reqwest::Client;
use sheets::config::{StoreConfig, read_secret};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print the message instead of posting it.
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remind players who have not paid for a month.
    Payments {
        /// Month header label, defaults to the current month name.
        #[arg(long)]
        month: Option<String>,
    },

    /// Summarize attendance for a date.
    Attendance {
        /// Date header label, defaults to today as YYYY-MM-DD.
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let ledger = StoreConfig::load().ledger()?;

    let text = match args.command {
        Command::Payments { month } => {
            let month = month.unwrap_or_else(current_month);
            payment_reminder(&ledger.list_payments().await?, &month)?
        }
        Command::Attendance { date } => {
            let date = date.unwrap_or_else(today_formatted);
            attendance_summary(&date, &ledger.present_on(&date).await?)
        }
    };

    if args.dry_run {
        println!("{text}");
        return Ok(());
    }

    let webhook_url = read_secret("NOTIFY_WEBHOOK_URL").context("NOTIFY_WEBHOOK_URL not set")?;
    deliver(&Client::new(), &webhook_url, &text).await?;

    info!("Notification sent");
    Ok(())
}
