//! CLI entry point for the driftbook rebalancer.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};

use driftbook::{RebalanceRecommendation, format_cents};
use driftbook_broker::mock::MockBroker;
use driftbook_rebalancer::audit::AuditLog;
use driftbook_rebalancer::book::Book;
use driftbook_rebalancer::{
    CancellationToken, EngineConfig, Error, ExecuteOptions, RebalanceExecution,
    RebalanceOrchestrator, StrategySelection,
};

#[derive(Parser)]
#[command(name = "rebalancer")]
#[command(about = "Portfolio drift analysis and rebalancing")]
#[command(version)]
struct Cli {
    /// Path to config.toml (defaults apply when the file is missing)
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show current allocation against targets
    Drift {
        /// Path to book.json
        book: PathBuf,
        portfolio: String,
    },

    /// Evaluate strategies and list recommendations
    Analyze {
        book: PathBuf,
        portfolio: String,

        /// Strategy id or name (default: all enabled strategies)
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Execute the top recommendation against the paper broker
    Execute {
        book: PathBuf,
        portfolio: String,

        #[arg(long)]
        strategy: Option<String>,

        /// Simulate fills without sending orders
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt (for automation/cron)
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<Error>() {
            Some(Error::Aborted(msg)) => {
                eprintln!("{msg}");
                process::exit(0);
            }
            Some(Error::Validation(_)) | Some(Error::ConcurrentExecution(_)) => {
                eprintln!("\nRejected: {e:#}");
                process::exit(2);
            }
            _ => {
                eprintln!("Error: {e:#}");
                process::exit(1);
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Drift { book, portfolio } => {
            let orchestrator = build(&config, &book)?;
            let report = orchestrator.drift(&portfolio)?;
            println!("{report}");
            Ok(())
        }
        Command::Analyze {
            book,
            portfolio,
            strategy,
        } => {
            let orchestrator = build(&config, &book)?;
            let recommendations = orchestrator.analyze(&portfolio, &selection(strategy))?;
            if recommendations.is_empty() {
                println!("\nNo rebalancing needed.");
            }
            for rec in &recommendations {
                display_recommendation(rec);
            }
            Ok(())
        }
        Command::Execute {
            book,
            portfolio,
            strategy,
            dry_run,
            force,
        } => {
            let orchestrator = build(&config, &book)?;
            let mut recommendations = orchestrator.analyze(&portfolio, &selection(strategy))?;
            if recommendations.is_empty() {
                println!("\nNo rebalancing needed.");
                return Ok(());
            }
            let rec = recommendations.remove(0);
            display_recommendation(&rec);

            if !dry_run && !force {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt("Execute?")
                    .default(false)
                    .interact()
                    .map_err(|e| Error::Aborted(format!("confirmation prompt failed: {e}")))?;
                if !confirmed {
                    return Err(Error::Aborted("Aborted.".into()).into());
                }
            }

            let execution =
                orchestrator.execute(rec, ExecuteOptions { dry_run }, &CancellationToken::new())?;
            display_execution(&execution);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<EngineConfig> {
    if path.exists() {
        let config = EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    } else {
        info!("{} not found, using defaults", path.display());
        Ok(EngineConfig::default())
    }
}

/// Wire the orchestrator to the book's data and a paper broker that fills
/// market orders at book prices.
fn build(config: &EngineConfig, book_path: &Path) -> anyhow::Result<RebalanceOrchestrator> {
    let book = Book::load(book_path).with_context(|| format!("loading book {}", book_path.display()))?;

    let broker = book
        .quotes()
        .into_iter()
        .fold(MockBroker::builder(), |b, (symbol, quote)| {
            b.with_price(symbol, quote.price_cents)
        })
        .build();
    let market = book.market_data();
    let store = book.into_store();

    let orchestrator = RebalanceOrchestrator::new(
        Arc::new(market),
        Arc::new(broker),
        Arc::new(store),
        config.clone(),
    )?;
    match AuditLog::open(&config.audit_path()) {
        Ok(audit) => Ok(orchestrator.with_audit(audit)),
        Err(e) => {
            warn!("audit log disabled: {e}");
            Ok(orchestrator)
        }
    }
}

fn selection(strategy: Option<String>) -> StrategySelection {
    match strategy {
        Some(name) => StrategySelection::Named(name),
        None => StrategySelection::All,
    }
}

fn display_recommendation(rec: &RebalanceRecommendation) {
    println!(
        "\n{} [{}] {}: {}",
        rec.strategy_name, rec.urgency, rec.strategy_id, rec.reason
    );
    println!(
        "  {:>3}  {:6} {:8} {:>12} {:>10} {:>14} {:>9} {:>9}",
        "#", "Action", "Symbol", "Shares", "Price", "Notional", "Current%", "Target%"
    );
    for (i, t) in rec.trades.iter().enumerate() {
        println!(
            "  {:>3}  {:6} {:8} {:>12.4} {:>10} {:>14} {:>8.2}% {:>8.2}%",
            i + 1,
            t.action,
            t.symbol,
            t.shares,
            format_cents(t.price_cents),
            format_cents(t.notional_cents),
            t.current_percent,
            t.target_percent,
        );
    }
    let impact = &rec.estimated_impact;
    println!(
        "\n  Trade value: {}  Est. cost: {}  Est. tax: {}",
        format_cents(rec.total_trade_value_cents),
        format_cents(impact.trading_costs_cents),
        format_cents(impact.estimated_tax_cents),
    );
    println!(
        "  Est. return: {:+.3}pp  Est. risk reduction: {:.3}pp",
        impact.expected_return, impact.risk_reduction
    );
}

fn display_execution(execution: &RebalanceExecution) {
    let tag = if execution.dry_run { "[DRY RUN] " } else { "" };
    println!("\n{tag}EXECUTION {} ({:?})", execution.id, execution.status);
    for t in &execution.trades {
        println!(
            "  {:6} {:8} {:>12.4}/{:<12.4} {:?}{}",
            t.action,
            t.symbol,
            t.filled_shares,
            t.requested_shares,
            t.status,
            t.error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default(),
        );
    }
    let r = &execution.results;
    println!(
        "\n  Executed: {}  Failed: {}  Cost: {}  Deviation: {:.3}pp  Score: {:.1}",
        r.trades_executed,
        r.trades_failed,
        format_cents(r.total_cost_cents),
        r.target_deviation,
        r.improvement_score
    );
    for e in &execution.errors {
        println!("  ! {e}");
    }
}
