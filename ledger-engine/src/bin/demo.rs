//! Transfer demonstration binary
//!
//! Creates three accounts, runs a successful transfer, an overdraft attempt
//! and a small transfer, then prints balances and history as JSON lines.

use anyhow::Context;
use ledger_engine::{Config, Error, LedgerEngine};
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ledger transfer demo");

    let config = match std::env::var("LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env()?,
    };

    let engine = LedgerEngine::open(config).context("opening ledger")?;

    let a = engine.create_account(Decimal::from(500))?;
    let b = engine.create_account(Decimal::from(300))?;
    let c = engine.create_account(Decimal::from(50))?;
    print_accounts(&engine)?;

    tracing::info!("Regular transfer");
    let record = engine.transfer(a.id, b.id, Decimal::from(100))?;
    println!("{}", serde_json::to_string(&record)?);

    tracing::info!("Overdraft attempt");
    match engine.transfer(c.id, a.id, Decimal::from(100)) {
        Err(Error::InsufficientFunds { .. }) => tracing::info!("Overdraft rejected as expected"),
        Err(e) => return Err(e.into()),
        Ok(record) => anyhow::bail!("overdraft unexpectedly committed as {}", record.id),
    }

    tracing::info!("Small transfer");
    engine.transfer(c.id, b.id, Decimal::from(30))?;

    print_accounts(&engine)?;
    for record in engine.list_transaction_history()? {
        println!("{}", serde_json::to_string(&record)?);
    }

    let report = engine.audit()?;
    anyhow::ensure!(report.is_clean(), "audit failed: {:?}", report);

    tracing::info!(total_balance = %report.total_balance, "Demo finished");
    Ok(())
}

fn print_accounts(engine: &LedgerEngine) -> anyhow::Result<()> {
    for account in engine.list_accounts()? {
        println!("{}", serde_json::to_string(&account)?);
    }
    Ok(())
}
