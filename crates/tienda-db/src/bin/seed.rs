//! # Demo Catalog Seeder
//!
//! Populates an empty database with a small clothing catalog, a couple of
//! registered customers and a welcome coupon, for local development.
//!
//! ## Usage
//! ```bash
//! cargo run -p tienda-db --bin seed
//!
//! # Specify database path
//! cargo run -p tienda-db --bin seed -- --db ./data/tienda.db
//! ```
//!
//! ## Generated Catalog
//! - Garments with one variant per size (`REM-001` in S/M/L/XL, ...)
//! - Accessories without variants (single size, own stock)
//! - Customers `Ana Gómez` and `Luis Pérez` for running-tab testing
//! - Coupon `BIENVENIDA10` (10% off, capped at $50.00)

use std::env;
use tienda_core::DiscountType;
use tienda_db::{Database, DbConfig, NewCoupon, NewCustomer, NewProduct, NewVariant, ProductFilter};

/// (sku, name, category, price in cents)
const GARMENTS: &[(&str, &str, &str, i64)] = &[
    ("REM-001", "Remera Lisa", "remeras", 12_000),
    ("REM-002", "Remera Estampada", "remeras", 14_500),
    ("CAM-001", "Camisa Oxford", "camisas", 28_000),
    ("BUZ-001", "Buzo Canguro", "buzos", 32_000),
    ("JEA-001", "Jean Recto", "pantalones", 35_000),
    ("JEA-002", "Jean Mom", "pantalones", 36_500),
    ("CPR-001", "Campera de Jean", "camperas", 58_000),
    ("VES-001", "Vestido Midi", "vestidos", 42_000),
];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

/// (sku, name, category, size, price in cents)
const ACCESSORIES: &[(&str, &str, &str, &str, i64)] = &[
    ("GOR-001", "Gorra Bordada", "accesorios", "U", 9_500),
    ("CIN-001", "Cinturón de Cuero", "accesorios", "U", 11_000),
    ("MED-001", "Medias x3", "accesorios", "U", 4_500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./tienda_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tienda demo catalog seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./tienda_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tienda demo catalog seeder");
    println!("==========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db
        .products()
        .list(&ProductFilter {
            include_inactive: true,
            limit: Some(1),
            ..Default::default()
        })
        .await?;
    if !existing.is_empty() {
        println!("⚠ Database already has products; skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut variants = 0;
    for (index, (sku, name, category, price_cents)) in GARMENTS.iter().enumerate() {
        let product = db
            .products()
            .insert(&NewProduct {
                name: name.to_string(),
                category: Some(category.to_string()),
                sku: Some(sku.to_string()),
                price_cents: *price_cents,
                // Every third garment shows a crossed-out list price.
                original_price_cents: (index % 3 == 0).then(|| price_cents + price_cents / 5),
                ..Default::default()
            })
            .await?;

        for (size_index, size) in SIZES.iter().enumerate() {
            db.products()
                .add_variant(
                    &product.id,
                    &NewVariant {
                        sku: Some(sku.to_string()),
                        size: Some(size.to_string()),
                        color: None,
                        stock: ((index + size_index * 3) % 7) as i64,
                    },
                )
                .await?;
            variants += 1;
        }
    }
    println!("✓ {} garments, {} variants", GARMENTS.len(), variants);

    for (index, (sku, name, category, size, price_cents)) in ACCESSORIES.iter().enumerate() {
        db.products()
            .insert(&NewProduct {
                name: name.to_string(),
                category: Some(category.to_string()),
                sku: Some(sku.to_string()),
                size: Some(size.to_string()),
                price_cents: *price_cents,
                stock: 10 + index as i64 * 5,
                ..Default::default()
            })
            .await?;
    }
    println!("✓ {} accessories", ACCESSORIES.len());

    for (name, email) in [
        ("Ana Gómez", "ana.gomez@example.com"),
        ("Luis Pérez", "luis.perez@example.com"),
    ] {
        db.customers()
            .insert(&NewCustomer {
                name: name.to_string(),
                email: Some(email.to_string()),
                phone: None,
            })
            .await?;
    }
    println!("✓ 2 customers");

    db.coupons()
        .create(&NewCoupon {
            code: "BIENVENIDA10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 1_000,
            min_purchase_cents: 0,
            max_discount_cents: Some(5_000),
            valid_from: None,
            valid_until: None,
            max_uses: None,
            is_active: true,
        })
        .await?;
    println!("✓ Coupon BIENVENIDA10");

    println!();
    println!("✓ Seed complete!");
    db.close().await;
    Ok(())
}
