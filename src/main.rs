// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use std::env;
use std::path::Path;
use tracing::{error, info};

use expense_tracker::display::{expense_count_label, format_amount, format_date, truncate};
use expense_tracker::importer::{parse_amount, parse_date};
use expense_tracker::{
    config, logging, AppConfig, ExpenseStore, MemoryStorage, NewExpense, Period, SqliteStorage,
};

const USAGE: &str = "\
Usage:
  expense-tracker                                   Interactive terminal UI
  expense-tracker add <description> <amount> <category> [date] [notes]
  expense-tracker import <file.csv>
  expense-tracker list [all|today|week|month|year]

Environment:
  EXPENSE_TRACKER_DB            SQLite file (default: expenses.db)
  EXPENSE_TRACKER_STORAGE_KEY   Key the expense list is stored under (default: expenses)
  EXPENSE_TRACKER_DEBOUNCE_MS   Write debounce in milliseconds (default: 1000)
  EXPENSE_TRACKER_LOG_LEVEL     Log filter, e.g. info or debug
  EXPENSE_TRACKER_LOG_PATH      Log to this file instead of stderr";

fn main() -> Result<()> {
    config::init();
    let config = AppConfig::from_env();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    // The TUI owns the terminal, so only CLI commands log to stderr
    logging::init(&config.log, command.is_some());

    match command {
        Some("add") => run_add(&config, &args[2..]),
        Some("import") => run_import(&config, &args[2..]),
        Some("list") => run_list(&config, &args[2..]),
        Some("help") | Some("--help") | Some("-h") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some(other) => {
            eprintln!("❌ Unknown command: {}\n", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
        None => run_ui_mode(&config),
    }
}

/// Open the configured database, degrading to an unsaved in-memory store
fn open_store(config: &AppConfig) -> ExpenseStore {
    match SqliteStorage::open(&config.db_path) {
        Ok(storage) => ExpenseStore::open(storage, &config.store),
        Err(e) => {
            error!("Falling back to in-memory storage: {:#}", e);
            eprintln!("⚠️  Could not open {}; changes will not be saved", config.db_path.display());
            ExpenseStore::open(MemoryStorage::new(), &config.store)
        }
    }
}

fn run_add(config: &AppConfig, args: &[String]) -> Result<()> {
    if args.len() < 3 {
        bail!("add needs <description> <amount> <category>\n\n{}", USAGE);
    }

    let amount = parse_amount(&args[1])
        .with_context(|| format!("Amount '{}' is not a number", args[1]))?;
    let date = match args.get(3) {
        Some(raw) => parse_date(raw, &Local)
            .with_context(|| format!("Date '{}' is not recognised (try YYYY-MM-DD)", raw))?,
        None => Utc::now(),
    };

    let mut candidate = NewExpense::new(&args[0], amount, &args[2], date);
    if let Some(notes) = args.get(4) {
        candidate = candidate.with_notes(notes);
    }

    let mut store = open_store(config);
    let added = store.add(candidate)?;
    println!(
        "✓ Added {} - {} ({}, {})",
        added.description,
        format_amount(added.amount),
        added.category,
        format_date(&added.date)
    );

    // Dropping the store flushes the debounced write
    Ok(())
}

fn run_import(config: &AppConfig, args: &[String]) -> Result<()> {
    let Some(file) = args.first() else {
        bail!("import needs a <file.csv>\n\n{}", USAGE);
    };

    println!("📂 Importing {}...", file);
    let mut store = open_store(config);

    match store.import_file(Path::new(file)) {
        Ok(added) => {
            println!("✓ Expenses uploaded successfully! ({} added)", added);
            println!("✓ Store now holds {} expenses", store.len());
            Ok(())
        }
        Err(e) => {
            info!("Import of {} failed: {:?}", file, e);
            bail!("{}", e);
        }
    }
}

fn run_list(config: &AppConfig, args: &[String]) -> Result<()> {
    let period: Period = match args.first() {
        Some(raw) => raw.parse()?,
        None => Period::All,
    };

    let store = open_store(config);
    let view = store.view(period);

    println!("Expenses - {}", period.label());
    println!("{}", expense_count_label(view.expenses.len()));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if view.expenses.is_empty() {
        println!("No expenses yet");
        return Ok(());
    }

    for expense in &view.expenses {
        println!(
            "{:<13} {:<30} {:<14} {:>12}",
            format_date(&expense.date),
            truncate(&expense.description, 30),
            truncate(&expense.category, 14),
            format_amount(expense.amount)
        );
        if let Some(notes) = &expense.notes {
            println!("{:<13} \"{}\"", "", notes);
        }
    }

    let summary = &view.summary;
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total Spent:          {}", format_amount(summary.total));
    println!("Total Expenses:       {}", summary.count);
    println!("Average per Expense:  {}", format_amount(summary.average));
    if let Some(top) = &summary.top_category {
        println!(
            "Top Spending Category: {} - {}",
            top.category,
            format_amount(top.total)
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    let store = open_store(config);
    let mut app = ui::App::new(store);
    ui::run_ui(&mut app)?;

    app.store.flush();
    println!("✅ Saved {} expenses", app.store.len());
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the CLI commands:\n");
    eprintln!("{}", USAGE);
    std::process::exit(1);
}
