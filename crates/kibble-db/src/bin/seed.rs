//! # Seed Data Generator
//!
//! Populates the database with a small pet-food catalog, fills a demo
//! cart and checks it out.
//!
//! ## Usage
//! ```bash
//! # Uses KIBBLE_DATABASE_PATH (default ./kibble.db)
//! cargo run -p kibble-db --bin seed
//!
//! # Specify database path and demo user
//! cargo run -p kibble-db --bin seed -- --db ./data/kibble.db --user demo-user
//!
//! # More logging
//! KIBBLE_LOG=debug cargo run -p kibble-db --bin seed
//! ```

use chrono::Utc;
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kibble_core::{Money, Product};
use kibble_db::{Database, StoreConfig};

/// (brand, product, base price in cents)
const CATALOG: &[(&str, &str, i64)] = &[
    ("Northpaw", "Salmon Kibble", 1299),
    ("Northpaw", "Lamb & Rice Kibble", 1199),
    ("Northpaw", "Puppy Starter", 1399),
    ("Whiskerly", "Tuna Pate", 129),
    ("Whiskerly", "Chicken Pate", 119),
    ("Whiskerly", "Indoor Cat Dry", 999),
    ("Barkside", "Liver Treats", 450),
    ("Barkside", "Dental Chews", 650),
    ("Barkside", "Training Bites", 399),
    ("Meadow", "Timothy Hay", 799),
    ("Meadow", "Rabbit Pellets", 899),
    ("Meadow", "Guinea Pig Mix", 849),
];

/// Size variants: (label, price multiplier percent)
const SIZES: &[(&str, i64)] = &[("Small", 100), ("Medium", 180), ("Large", 320)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = StoreConfig::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let mut user_id = String::from("demo-user");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--user" | "-u" => {
                if i + 1 < args.len() {
                    user_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kibble Storefront Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>     Database file path (default: $KIBBLE_DATABASE_PATH or ./kibble.db)");
                println!("  -u, --user <ID>     User placing the demo order (default: demo-user)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(path = %config.database_path.display(), "Seeding database");
    let db = Database::new(config.db_config()).await?;

    let existing = db.products().count().await?;
    let products = if existing > 0 {
        info!(existing, "Catalog already seeded, skipping products");
        Vec::new()
    } else {
        seed_catalog(&db).await?
    };

    if products.len() < 2 {
        info!("No fresh products to order; done");
        return Ok(());
    }

    // Demo cart: two of the first product, one of the second
    db.carts().add_item(&user_id, &products[0].id, 2).await?;
    db.carts().add_item(&user_id, &products[1].id, 1).await?;

    let cart_total: Money = db.carts().cart_total(&user_id).await?;
    info!(user_id = %user_id, total = %cart_total, "Demo cart filled");

    let order = db
        .checkout()
        .place_order(&user_id, "1 Kibble Lane, Springfield")
        .await?;

    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(())
}

async fn seed_catalog(db: &Database) -> Result<Vec<Product>, Box<dyn std::error::Error>> {
    let start = std::time::Instant::now();
    let mut inserted = Vec::with_capacity(CATALOG.len() * SIZES.len());

    for (idx, (brand, name, base_price)) in CATALOG.iter().enumerate() {
        for (size_idx, (size, pct)) in SIZES.iter().enumerate() {
            let product = generate_product(brand, name, size, base_price * pct / 100, idx * 10 + size_idx);

            match db.products().insert(&product).await {
                Ok(product) => inserted.push(product),
                Err(e) => warn!(name = %product.name, error = %e, "Failed to insert product"),
            }
        }
    }

    info!(count = inserted.len(), elapsed = ?start.elapsed(), "Catalog seeded");
    Ok(inserted)
}

/// Builds one catalog product with stock between 5 and 40.
fn generate_product(brand: &str, name: &str, size: &str, price_cents: i64, seed: usize) -> Product {
    let now = Utc::now();

    Product {
        id: Uuid::new_v4().to_string(),
        name: format!("{name} {size}"),
        description: Some(format!("{brand} {name}, {size} bag")),
        brand: Some(brand.to_string()),
        price_cents,
        stock: 5 + ((seed * 7) % 36) as i64,
        created_at: now,
        updated_at: now,
    }
}
