use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use env_logger::Env;
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;

use hey_insights::{
    count_clients, count_transactions, insert_clients, insert_transactions, load_clients_csv,
    load_transactions_csv, setup_database, AppConfig, DateRange, InsightsService,
};

#[derive(Parser)]
#[clap(name = "hey-insights")]
#[clap(about = "Client spending reports over imported card transactions", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import client and/or transaction CSV files into the database
    Import {
        #[clap(long)]
        clients: Option<PathBuf>,
        #[clap(long)]
        transactions: Option<PathBuf>,
    },
    /// Spending statistics for a client
    Statistics {
        client_id: String,
        /// Period label (the full history is always used)
        #[clap(long)]
        months: Option<u32>,
    },
    /// Month-by-month totals and top categories
    MonthlyReport {
        client_id: String,
        #[clap(long)]
        start_date: Option<NaiveDate>,
        #[clap(long)]
        end_date: Option<NaiveDate>,
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Spending per category
    CategorySpending {
        client_id: String,
        #[clap(long)]
        start_date: Option<NaiveDate>,
        #[clap(long)]
        end_date: Option<NaiveDate>,
    },
    /// Most recent transactions
    Recent {
        client_id: String,
        #[clap(long)]
        limit: Option<usize>,
    },
    /// Predict the current month's spending
    Predict { client_id: String },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Import { clients, transactions } => run_import(&config, clients, transactions),
        Command::Statistics { client_id, months } => {
            let service = InsightsService::open(&config)?;
            print_json(&service.statistics(&client_id, months)?)
        }
        Command::MonthlyReport { client_id, start_date, end_date, limit } => {
            let service = InsightsService::open(&config)?;
            let range = DateRange::new(start_date, end_date);
            print_json(&service.monthly_report(&client_id, range, limit)?)
        }
        Command::CategorySpending { client_id, start_date, end_date } => {
            let service = InsightsService::open(&config)?;
            let range = DateRange::new(start_date, end_date);
            print_json(&service.category_spending(&client_id, range)?)
        }
        Command::Recent { client_id, limit } => {
            let service = InsightsService::open(&config)?;
            print_json(&service.recent(&client_id, limit)?)
        }
        Command::Predict { client_id } => {
            let service = InsightsService::open(&config)?;
            print_json(&service.predict(&client_id)?)
        }
    }
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn run_import(
    config: &AppConfig,
    clients: Option<PathBuf>,
    transactions: Option<PathBuf>,
) -> Result<()> {
    println!("🗄️  Data Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if clients.is_none() && transactions.is_none() {
        anyhow::bail!("Nothing to import: pass --clients and/or --transactions");
    }

    // 1. Setup database
    println!("\n🔧 Setting up database {:?}...", config.database_path);
    let conn = Connection::open(&config.database_path)?;
    setup_database(&conn)?;
    println!("✓ Database initialized with WAL mode");

    // 2. Clients
    if let Some(path) = clients {
        println!("\n📂 Loading clients from {:?}...", path);
        let loaded = load_clients_csv(&path)?;
        println!("✓ Loaded {} client records", loaded.len());

        let inserted = insert_clients(&conn, &loaded)?;
        println!("✓ Inserted {} new clients", inserted);
    }

    // 3. Transactions
    if let Some(path) = transactions {
        println!("\n📂 Loading transactions from {:?}...", path);
        let loaded = load_transactions_csv(&path)?;
        println!("✓ Loaded {} transaction records", loaded.len());

        let summary = insert_transactions(&conn, &loaded)?;
        println!("✓ Inserted: {} transactions", summary.inserted);
        println!("✓ Skipped duplicates: {}", summary.duplicates);
    }

    // 4. Verify
    println!("\n🔍 Verifying database...");
    println!("✓ Database contains {} clients", count_clients(&conn)?);
    println!("✓ Database contains {} transactions", count_transactions(&conn)?);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");

    Ok(())
}
