//! # Seed Data Generator
//!
//! Populates a demo tenant for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p tabline-db --bin seed
//!
//! # Specify database path and tenant
//! cargo run -p tabline-db --bin seed -- --db ./data/tabline.db --tenant <uuid>
//! ```
//!
//! ## Generated Data
//! - Payment methods: cash (settles at once), debit (1 day), credit (30 days)
//! - Services and products, with stock for the products
//! - Commission rules at every level of the hierarchy
//! - A scheduled appointment and an open order linked to it

use chrono::Utc;
use std::env;
use tabline_core::{
    BillingCategory, CalculationBase, CatalogItem, CommissionRateKind, CommissionRule, CommissionScope, ItemKind,
    Money, Order, PaymentMethodConfig, Percentage, DEFAULT_TENANT_ID,
};
use tabline_db::{Database, DbConfig};

/// (id, name, price in cents)
const SERVICES: &[(&str, &str, i64)] = &[
    ("svc-haircut", "Haircut", 8000),
    ("svc-beard", "Beard trim", 4500),
    ("svc-coloring", "Coloring", 15000),
];

/// (id, name, price in cents, unit cost in cents, on hand)
const PRODUCTS: &[(&str, &str, i64, i64, i64)] = &[
    ("prd-pomade", "Matte pomade", 2000, 900, 24),
    ("prd-shampoo", "Beard shampoo", 3500, 1500, 12),
    ("prd-oil", "Beard oil", 4200, 1800, 0),
];

const PROFESSIONALS: &[&str] = &["pro-ana", "pro-bruno"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tabline_dev.db");
    let mut tenant_id = DEFAULT_TENANT_ID.to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tabline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>       Database file path (default: ./tabline_dev.db)");
                println!("  -t, --tenant <ID>     Tenant id (default: {})", DEFAULT_TENANT_ID);
                println!("  -h, --help            Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tabline Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant_id);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.catalog().count(&tenant_id, ItemKind::Service).await?;
    if existing > 0 {
        println!("⚠ Tenant already has {} services", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Payment methods
    for method in payment_methods(&tenant_id) {
        db.payment_methods().upsert(&method).await?;
    }
    println!("✓ Payment methods: cash, debit, credit");

    // Catalog
    for (id, name, _price) in SERVICES {
        db.catalog()
            .upsert(&catalog_item(&tenant_id, id, name, ItemKind::Service, 0))
            .await?;
    }
    for (id, name, _price, cost, on_hand) in PRODUCTS {
        db.catalog()
            .upsert(&catalog_item(&tenant_id, id, name, ItemKind::Product, *cost))
            .await?;
        db.stock().set_quantity(&tenant_id, id, *on_hand).await?;
    }
    println!("✓ Catalog: {} services, {} products", SERVICES.len(), PRODUCTS.len());

    // Commission rules
    let rules = commission_rules(&tenant_id);
    for rule in &rules {
        rule.validate()?;
        db.commissions().insert_rule(rule).await?;
    }
    println!("✓ Commission rules: {}", rules.len());

    // Appointment + open order
    let appointment_id = tabline_core::new_id();
    db.appointments()
        .insert_scheduled(&tenant_id, &appointment_id, "cus-demo", Some(PROFESSIONALS[0]))
        .await?;

    let mut order = Order::new(&tenant_id, "cus-demo", "seed", Utc::now().date_naive())
        .with_unit("unit-downtown")
        .with_appointment(&appointment_id);
    let (haircut_id, _, haircut_price) = SERVICES[0];
    let (pomade_id, _, pomade_price, _, _) = PRODUCTS[0];
    order.add_item(
        ItemKind::Service,
        haircut_id,
        Some(PROFESSIONALS[0]),
        1,
        Money::from_cents(haircut_price),
        Money::zero(),
    )?;
    order.add_item(
        ItemKind::Product,
        pomade_id,
        Some(PROFESSIONALS[0]),
        1,
        Money::from_cents(pomade_price),
        Money::zero(),
    )?;
    order.add_payment("pm-cash", Money::from_cents(6000))?;
    order.add_payment("pm-credit", Money::from_cents(4000))?;
    db.orders().insert(&order).await?;

    println!("✓ Open order {} ({} due)", order.id, order.items_total());
    println!();
    println!("Close it with:");
    println!("  settle open-register 10000");
    println!("  settle close {}", order.id);
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn payment_methods(tenant_id: &str) -> Vec<PaymentMethodConfig> {
    let base = PaymentMethodConfig::generic(tenant_id, "");
    vec![
        PaymentMethodConfig {
            id: "pm-cash".to_string(),
            name: "Cash".to_string(),
            billing_category: BillingCategory::Cash,
            ..base.clone()
        },
        PaymentMethodConfig {
            id: "pm-debit".to_string(),
            name: "Debit card".to_string(),
            settlement_delay_days: 1,
            fee_percentage: Percentage::from_bps(199),
            billing_category: BillingCategory::DebitCard,
            ..base.clone()
        },
        PaymentMethodConfig {
            id: "pm-credit".to_string(),
            name: "Credit card".to_string(),
            settlement_delay_days: 30,
            fee_percentage: Percentage::from_bps(349),
            fixed_fee: Money::from_cents(50),
            billing_category: BillingCategory::CreditCard,
            ..base
        },
    ]
}

/// Catalog entry with no stock; product quantities are set afterwards.
fn catalog_item(tenant_id: &str, id: &str, name: &str, kind: ItemKind, unit_cost: i64) -> CatalogItem {
    CatalogItem {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        kind,
        name: name.to_string(),
        is_active: true,
        on_hand: 0,
        unit_cost: Money::from_cents(unit_cost),
    }
}

fn commission_rules(tenant_id: &str) -> Vec<CommissionRule> {
    let rule = |id: &str, scope: CommissionScope, bps: i64| CommissionRule {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        scope,
        service_id: None,
        professional_id: None,
        unit_id: None,
        item_kind: None,
        rate_kind: CommissionRateKind::Percentage,
        rate_value: bps,
        base: CalculationBase::Gross,
        effective_from: None,
        effective_until: None,
        is_active: true,
    };

    vec![
        // Tenant-wide: 40% on services, 10% on products
        CommissionRule {
            item_kind: Some(ItemKind::Service),
            ..rule("rule-tenant-services", CommissionScope::Tenant, 4000)
        },
        CommissionRule {
            item_kind: Some(ItemKind::Product),
            ..rule("rule-tenant-products", CommissionScope::Tenant, 1000)
        },
        // Downtown branch pays 45% on services
        CommissionRule {
            unit_id: Some("unit-downtown".to_string()),
            item_kind: Some(ItemKind::Service),
            ..rule("rule-unit-downtown", CommissionScope::Unit, 4500)
        },
        // Bruno negotiated 50%, net of card fees
        CommissionRule {
            professional_id: Some(PROFESSIONALS[1].to_string()),
            base: CalculationBase::Net,
            ..rule("rule-pro-bruno", CommissionScope::Professional, 5000)
        },
        // Coloring pays a fixed 30.00 per session
        CommissionRule {
            service_id: Some("svc-coloring".to_string()),
            rate_kind: CommissionRateKind::Fixed,
            ..rule("rule-svc-coloring", CommissionScope::Service, 3000)
        },
    ]
}
