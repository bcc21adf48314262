//! export_report - write the guest history spreadsheet to a local file

use anyhow::{anyhow, Result};
use clap::Parser;

use guest_counter::{generate_report, JsonHistoryStore, ReportLocale};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the history document.
    #[arg(long, env = "GUEST_COUNTER_HISTORY_PATH", default_value = "history.json")]
    history_path: String,
    /// Output file path for the spreadsheet.
    #[arg(long, default_value = "guests_report.xlsx")]
    output: String,
    /// Header language (ru|en).
    #[arg(long, default_value = "ru")]
    locale: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let locale = args.locale.parse::<ReportLocale>()?;

    let store = JsonHistoryStore::open(&args.history_path);
    match generate_report(&store, locale)? {
        Some(bytes) => {
            std::fs::write(&args.output, &bytes)
                .map_err(|e| anyhow!("failed to write {}: {}", args.output, e))?;
            println!("report written to {}", args.output);
        }
        None => println!("no history in {}; nothing to export", args.history_path),
    }
    Ok(())
}
