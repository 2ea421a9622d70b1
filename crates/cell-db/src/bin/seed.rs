//! # Seed Data Generator
//!
//! Populates the database with demo configuration for one tenant.
//!
//! ## Usage
//! ```bash
//! # Seed tenant "demo" in ./gateway_dev.db
//! cargo run -p cell-db --bin seed
//!
//! # Specify tenant and database path
//! cargo run -p cell-db --bin seed -- --tenant acme --db ./data/gateway.db
//! ```
//!
//! ## Generated Rows
//! - Region multipliers (NG is the tenant default)
//! - Item type multipliers (product is the tenant default)
//! - Two fee tiers: flat below 1000, percentage from 1000 up
//! - An allow-all rule on `b2b_groups` for the `admin` role

use anyhow::Context;
use rust_decimal::Decimal;
use std::env;

use cell_core::access::{RuleEffect, SubjectType};
use cell_core::TenantId;
use cell_db::{Database, DbConfig, MultiplierTable, NewAccessRule, NewFeeTier};

/// `(region code, multiplier as (mantissa, scale), is_default)`
const REGIONS: &[(&str, (i64, u32), bool)] = &[
    ("NG", (100, 2), true),
    ("GH", (110, 2), false),
    ("KE", (125, 2), false),
    ("US_CA", (95, 2), false),
];

/// `(item type, multiplier as (mantissa, scale), is_default)`
const ITEM_TYPES: &[(&str, (i64, u32), bool)] = &[
    ("product", (100, 2), true),
    ("digital", (50, 2), false),
    ("food", (0, 0), false),
    ("luxury", (150, 2), false),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut tenant = String::from("demo");
    let mut db_path = String::from("./gateway_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--tenant" | "-t" => {
                if i + 1 < args.len() {
                    tenant = args[i + 1].clone();
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Cell Gateway Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -t, --tenant <ID>  Tenant to seed (default: demo)");
                println!("  -d, --db <PATH>    Database file path (default: ./gateway_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let tenant = TenantId::parse(&tenant).context("invalid tenant id")?;

    println!("🌱 Cell Gateway Seed Data Generator");
    println!("===================================");
    println!("Database: {}", db_path);
    println!("Tenant:   {}", tenant);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let config = db.config();

    for (code, (mantissa, scale), is_default) in REGIONS {
        config
            .upsert_multiplier(
                MultiplierTable::Region,
                &tenant,
                code,
                Decimal::new(*mantissa, *scale),
                *is_default,
            )
            .await?;
    }
    println!("✓ {} region multipliers", REGIONS.len());

    for (name, (mantissa, scale), is_default) in ITEM_TYPES {
        config
            .upsert_multiplier(
                MultiplierTable::ItemType,
                &tenant,
                name,
                Decimal::new(*mantissa, *scale),
                *is_default,
            )
            .await?;
    }
    println!("✓ {} item type multipliers", ITEM_TYPES.len());

    let tiers = [
        NewFeeTier {
            min_amount: Decimal::ZERO,
            max_amount: Some(Decimal::from(1000)),
            percentage: None,
            flat_fee: Some(Decimal::from(50)),
            is_default: true,
        },
        NewFeeTier {
            min_amount: Decimal::from(1000),
            max_amount: None,
            percentage: Some(Decimal::new(15, 3)),
            flat_fee: None,
            is_default: false,
        },
    ];
    for tier in &tiers {
        config.upsert_fee_tier(&tenant, tier).await?;
    }
    println!("✓ {} fee tiers", tiers.len());

    let existing = db.access_rules().list(&tenant).await?;
    if existing.is_empty() {
        db.access_rules()
            .insert(
                &tenant,
                &NewAccessRule {
                    resource: "b2b_groups".to_string(),
                    action: "*".to_string(),
                    subject_type: SubjectType::Role,
                    subject_id: Some("admin".to_string()),
                    effect: RuleEffect::Allow,
                    priority: 100,
                },
            )
            .await?;
        println!("✓ admin access rule");
    } else {
        println!("⚠ Tenant already has {} access rules, skipping", existing.len());
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
