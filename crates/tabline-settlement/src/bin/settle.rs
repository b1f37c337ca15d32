//! # Settlement CLI
//!
//! Operator commands for closing and canceling orders and running the cash
//! register.
//!
//! ## Usage
//! ```bash
//! cargo run -p tabline-settlement --bin settle -- open-register 10000
//! cargo run -p tabline-settlement --bin settle -- close <order_id> --debt
//! cargo run -p tabline-settlement --bin settle -- cancel <order_id> customer left
//! cargo run -p tabline-settlement --bin settle -- close-register 18250 short on change
//!
//! # Against another database, as another user
//! cargo run -p tabline-settlement --bin settle -- --db ./tabline_dev.db --user pro-ana close <order_id>
//! ```
//!
//! Amounts are in cents. Reports are printed as JSON.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - Default: `info,tabline=debug,sqlx=warn`

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tabline_core::Money;
use tabline_db::Database;
use tabline_settlement::{CashRegisterDesk, CloseOptions, SettlementConfig, SettlementEngine, StockLedger};

const DEFAULT_USER: &str = "operator";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tabline=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_help() {
    println!("Tabline Settlement CLI");
    println!();
    println!("Usage: settle [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  close <ORDER_ID> [--tip] [--debt]          Close an order");
    println!("  cancel <ORDER_ID> <REASON...>              Cancel an order");
    println!("  open-register <CENTS>                      Open the cash register");
    println!("  close-register <CENTS> [JUSTIFICATION...]  Close the cash register");
    println!("  adjust-stock <PRODUCT_ID> <QUANTITY>       Set on-hand after a count");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>   Config file (default: platform config dir)");
    println!("  -d, --db <PATH>       Database file path (overrides config)");
    println!("  -t, --tenant <ID>     Tenant id (overrides config)");
    println!("  -u, --user <ID>       Acting user (default: {})", DEFAULT_USER);
    println!("  -h, --help            Show this help message");
}

fn parse_cents(value: Option<&String>, what: &str) -> Result<Money, Box<dyn std::error::Error>> {
    let raw = value.ok_or_else(|| format!("missing {}", what))?;
    let cents: i64 = raw.parse().map_err(|_| format!("{} must be an amount in cents, got '{}'", what, raw))?;
    Ok(Money::from_cents(cents))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut tenant: Option<String> = None;
    let mut user = DEFAULT_USER.to_string();
    let mut rest: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }

    let Some((command, params)) = rest.split_first() else {
        print_help();
        return Ok(());
    };

    let mut config = SettlementConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    if let Some(id) = tenant {
        config.tenant.id = id;
    }
    config.validate()?;

    let db = Database::new(config.db_config()).await?;
    let tenant_id = config.tenant_id().to_string();

    match command.as_str() {
        "close" => {
            let order_id = params.first().ok_or("missing order id")?;
            let mut options = CloseOptions::default();
            for flag in &params[1..] {
                match flag.as_str() {
                    "--tip" => options.allow_tip_as_change = Some(true),
                    "--debt" => options.allow_balance_as_debt = Some(true),
                    other => return Err(format!("unknown close flag '{}'", other).into()),
                }
            }

            let engine = SettlementEngine::new(db, config);
            let report = engine.close_order(order_id, &tenant_id, &user, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "cancel" => {
            let order_id = params.first().ok_or("missing order id")?;
            let reason = params[1..].join(" ");

            let engine = SettlementEngine::new(db, config);
            let result = engine.cancel_order(order_id, &tenant_id, &user, &reason).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "open-register" => {
            let opening = parse_cents(params.first(), "opening balance")?;
            let desk = CashRegisterDesk::new(db, config.divergence_threshold());
            let session = desk.open(&tenant_id, &user, opening).await?;
            println!("Opened session {} with {}", session.id, session.opening_balance);
        }
        "close-register" => {
            let actual = parse_cents(params.first(), "counted cash")?;
            let justification = params[1..].join(" ");
            let justification = Some(justification.as_str()).filter(|j| !j.is_empty());

            let desk = CashRegisterDesk::new(db, config.divergence_threshold());
            let session = desk.close(&tenant_id, &user, actual, justification).await?;
            println!(
                "Closed session {}: expected {}, counted {}, divergence {}",
                session.id,
                session.expected_balance.unwrap_or_default(),
                actual,
                session.divergence.unwrap_or_default()
            );
        }
        "adjust-stock" => {
            let product_id = params.first().ok_or("missing product id")?;
            let raw = params.get(1).ok_or("missing quantity")?;
            let quantity: i64 = raw.parse().map_err(|_| format!("quantity must be an integer, got '{}'", raw))?;

            let stock: Arc<dyn StockLedger> = Arc::new(db);
            stock.adjust_quantity(&tenant_id, product_id, quantity).await?;
            println!("{} on hand: {}", product_id, quantity);
        }
        other => {
            eprintln!("Unknown command '{}'", other);
            print_help();
        }
    }

    Ok(())
}
