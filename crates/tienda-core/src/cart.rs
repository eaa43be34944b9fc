//! # Storefront Cart and Favorites
//!
//! The shopper's cart and favorites list, owned by the client session and
//! persisted as versioned JSON blobs.
//!
//! ## Storage Envelope
//! ```text
//! { "version": 2, "items": [ ... ] }
//!        │
//!        └── mismatch ──► StorageVersionMismatch: caller discards the blob
//! ```
//!
//! Prices held here are what the shopper saw. Checkout always re-reads live
//! prices and stock; the cart is never trusted for money.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::validate_line_quantity;
use crate::types::{Product, ProductVariant};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Current storage format of [`StoredCart`] and [`StoredFavorites`].
pub const CART_STORAGE_VERSION: u32 = 2;

// =============================================================================
// Cart Item
// =============================================================================

/// One cart line. Unique by (product, variant, size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub selected_size: Option<String>,
    pub name: String,
    pub unit_price_cents: i64,
    pub image_url: Option<String>,
    pub quantity: i64,
}

impl CartItem {
    /// Creates a line from a product and an optional variant.
    pub fn from_product(product: &Product, variant: Option<&ProductVariant>, quantity: i64) -> Self {
        CartItem {
            product_id: product.id.clone(),
            variant_id: variant.map(|v| v.id.clone()),
            selected_size: variant
                .and_then(|v| v.size.clone())
                .or_else(|| product.size.clone()),
            name: product.name.clone(),
            unit_price_cents: product.price_cents,
            image_url: product
                .image_url
                .clone()
                .or_else(|| product.images.first().cloned()),
            quantity,
        }
    }

    fn same_line(&self, product_id: &str, variant_id: Option<&str>, size: Option<&str>) -> bool {
        self.product_id == product_id
            && self.variant_id.as_deref() == variant_id
            && self.selected_size.as_deref() == size
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The shopper's cart.
///
/// ## Invariants
/// - Lines are unique by (product_id, variant_id, selected_size)
/// - Quantity is always in 1..=MAX_ITEM_QUANTITY
/// - At most MAX_CART_ITEMS lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a line, or increases the quantity of the matching line.
    pub fn add(&mut self, item: CartItem) -> CoreResult<()> {
        validate_line_quantity(item.quantity)?;

        if let Some(existing) = self.items.iter_mut().find(|i| {
            i.same_line(
                &item.product_id,
                item.variant_id.as_deref(),
                item.selected_size.as_deref(),
            )
        }) {
            let new_qty = existing.quantity + item.quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            existing.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.items.push(item);
        Ok(())
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn set_quantity(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        size: Option<&str>,
        quantity: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            self.remove(product_id, variant_id, size);
            return Ok(());
        }
        validate_line_quantity(quantity)?;

        match self
            .items
            .iter_mut()
            .find(|i| i.same_line(product_id, variant_id, size))
        {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    /// Removes a line. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &str, variant_id: Option<&str>, size: Option<&str>) -> bool {
        let before = self.items.len();
        self.items.retain(|i| !i.same_line(product_id, variant_id, size));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn line_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Subtotal at the prices the shopper saw.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wraps the cart in the current storage envelope.
    pub fn to_stored(&self) -> StoredCart {
        StoredCart {
            version: CART_STORAGE_VERSION,
            items: self.items.clone(),
        }
    }

    pub fn to_storage_json(&self) -> CoreResult<String> {
        serde_json::to_string(&self.to_stored()).map_err(|e| CoreError::StorageCorrupt(e.to_string()))
    }

    /// Reads a stored blob, rejecting other storage versions.
    pub fn from_storage_json(json: &str) -> CoreResult<Self> {
        let stored: StoredCart =
            serde_json::from_str(json).map_err(|e| CoreError::StorageCorrupt(e.to_string()))?;
        Cart::try_from(stored)
    }
}

/// Versioned storage envelope for a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoredCart {
    pub version: u32,
    pub items: Vec<CartItem>,
}

impl TryFrom<StoredCart> for Cart {
    type Error = CoreError;

    fn try_from(stored: StoredCart) -> CoreResult<Self> {
        check_version(stored.version)?;
        let mut cart = Cart::new();
        for item in stored.items {
            cart.add(item)?;
        }
        Ok(cart)
    }
}

// =============================================================================
// Favorites
// =============================================================================

/// Anonymous shopper favorites: an ordered set of product ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Favorites {
    pub product_ids: Vec<String>,
}

impl Favorites {
    /// Adds or removes a product. Returns true when it is now a favorite.
    pub fn toggle(&mut self, product_id: &str) -> bool {
        if let Some(pos) = self.product_ids.iter().position(|id| id == product_id) {
            self.product_ids.remove(pos);
            false
        } else {
            self.product_ids.push(product_id.to_string());
            true
        }
    }

    pub fn contains(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }

    pub fn to_storage_json(&self) -> CoreResult<String> {
        serde_json::to_string(&StoredFavorites {
            version: CART_STORAGE_VERSION,
            product_ids: self.product_ids.clone(),
        })
        .map_err(|e| CoreError::StorageCorrupt(e.to_string()))
    }

    pub fn from_storage_json(json: &str) -> CoreResult<Self> {
        let stored: StoredFavorites =
            serde_json::from_str(json).map_err(|e| CoreError::StorageCorrupt(e.to_string()))?;
        check_version(stored.version)?;
        let mut favorites = Favorites::default();
        for id in stored.product_ids {
            if !favorites.contains(&id) {
                favorites.product_ids.push(id);
            }
        }
        Ok(favorites)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFavorites {
    version: u32,
    product_ids: Vec<String>,
}

fn check_version(found: u32) -> CoreResult<()> {
    if found != CART_STORAGE_VERSION {
        return Err(CoreError::StorageVersionMismatch {
            found,
            expected: CART_STORAGE_VERSION,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
