use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::env;
use std::path::Path;

use hr_registry::users::{ActorContext, Role};
use hr_registry::validation::RecordQualityEngine;
use hr_registry::{
    get_all_employees, run_deductions, setup_database, write_deduction_csv, Store,
};

const DB_PATH: &str = "hr-registry.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(),
        Some("import") if args.len() > 2 => run_import(&args[2]),
        Some("deductions") if args.len() > 3 => run_deduction_report(&args[2], &args[3]),
        Some("check") => run_quality_check(),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("hr-registry {}", hr_registry::VERSION);
    println!();
    println!("Usage:");
    println!("  hr-registry init                          Create the database");
    println!("  hr-registry import <file.afd>             Import time-clock punches");
    println!("  hr-registry deductions <start> <end>      Run the payroll deduction report");
    println!("  hr-registry check                         Run quality checks over employees");
}

fn run_init() -> Result<()> {
    println!("🗄️  Initializing database...");

    let conn = Connection::open(DB_PATH)?;
    setup_database(&conn)?;

    println!("✓ Database ready at {} (WAL mode)", DB_PATH);
    Ok(())
}

fn run_import(afd_path: &str) -> Result<()> {
    println!("⏰ AFD Import - time-clock punches → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut store = Store::open(Path::new(DB_PATH))?;
    let operator = ActorContext::new(0, "cli", Role::Master);

    println!("\n⏱️  Importing {}...", afd_path);
    let summary = store.import_afd(&operator, Path::new(afd_path))?;

    println!("✓ Inserted: {} punches", summary.inserted);
    println!("✓ Skipped duplicates: {}", summary.duplicates);
    println!("✓ Non-punch records: {}", summary.not_a_punch);
    println!("✓ Malformed lines: {}", summary.malformed);

    Ok(())
}

fn run_deduction_report(start: &str, end: &str) -> Result<()> {
    println!("💸 Payroll Deductions");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let period_start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    let period_end = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;

    let mut conn = Connection::open(DB_PATH)?;
    setup_database(&conn)?;

    let report = run_deductions(&mut conn, period_start, period_end)?;

    if report.is_empty() {
        println!("\n✓ No installments due in {} - {}", start, end);
        return Ok(());
    }

    let csv_path = format!("deductions_{}_{}.csv", start, end);
    let file = std::fs::File::create(&csv_path)?;
    write_deduction_csv(&report, file)?;

    println!("\n✓ Deducted {} installments", report.lines.len());
    println!("✓ Period total: {:.2}", report.total());
    println!("✓ Report written to {}", csv_path);

    Ok(())
}

fn run_quality_check() -> Result<()> {
    println!("✅ Record Quality Check");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = Connection::open(DB_PATH)?;
    setup_database(&conn)?;

    let employees = get_all_employees(&conn)?;
    println!("\n📂 Checking {} employees...", employees.len());

    let engine = RecordQualityEngine::new();
    let today = chrono::Utc::now().date_naive();
    let offenders = engine.validate_batch(&employees, today);

    if offenders.is_empty() {
        println!("✓ All records clean");
        return Ok(());
    }

    for report in &offenders {
        println!("\n⚠️  {}", report.summary());
        for failure in report.failures() {
            println!("   - {}: {}", failure.field, failure.message);
        }
    }

    println!("\n✓ {} of {} records need attention", offenders.len(), employees.len());
    Ok(())
}
