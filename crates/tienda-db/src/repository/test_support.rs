//! Fixtures shared by the repository tests.

use crate::repository::customer::NewCustomer;
use crate::repository::product::{NewProduct, NewVariant};
use crate::{Database, DbConfig};
use tienda_core::receipt::StoreProfile;
use tienda_core::{Customer, Product, ProductVariant};

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

/// A file-backed database with a real pool, for tests where several
/// connections write at once. Keep the directory alive for the test.
pub(crate) async fn file_db(dir: &tempfile::TempDir) -> Database {
    let config = DbConfig::new(dir.path().join("tienda.db")).max_connections(8);
    Database::new(config).await.unwrap()
}

pub(crate) fn store() -> StoreProfile {
    StoreProfile {
        name: "Tienda Norte".to_string(),
        site_url: "tiendanorte.com".to_string(),
        thank_you: "Gracias por su compra".to_string(),
        utc_offset_minutes: -180,
    }
}

/// A product without variants.
pub(crate) async fn product(
    db: &Database,
    name: &str,
    sku: &str,
    size: Option<&str>,
    price_cents: i64,
    stock: i64,
) -> Product {
    db.products()
        .insert(&NewProduct {
            name: name.to_string(),
            sku: Some(sku.to_string()),
            size: size.map(str::to_string),
            price_cents,
            stock,
            ..Default::default()
        })
        .await
        .unwrap()
}

/// A product with one variant per `(size, stock)` pair, all sharing `sku`.
pub(crate) async fn product_with_variants(
    db: &Database,
    name: &str,
    sku: &str,
    price_cents: i64,
    sizes: &[(&str, i64)],
) -> (Product, Vec<ProductVariant>) {
    let product = product(db, name, sku, None, price_cents, 0).await;
    let mut variants = Vec::new();
    for (size, stock) in sizes {
        let variant = db
            .products()
            .add_variant(
                &product.id,
                &NewVariant {
                    sku: Some(sku.to_string()),
                    size: Some(size.to_string()),
                    color: None,
                    stock: *stock,
                },
            )
            .await
            .unwrap();
        variants.push(variant);
    }
    let product = db.products().get_by_id(&product.id).await.unwrap().unwrap();
    (product, variants)
}

pub(crate) async fn customer(db: &Database, name: &str) -> Customer {
    db.customers()
        .insert(&NewCustomer {
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            phone: None,
        })
        .await
        .unwrap()
}

/// Stock of a product or variant row.
pub(crate) async fn stock_of(db: &Database, product_id: &str, variant_id: Option<&str>) -> i64 {
    match variant_id {
        Some(id) => db.products().get_variant(id).await.unwrap().unwrap().stock,
        None => db.products().get_by_id(product_id).await.unwrap().unwrap().stock,
    }
}
