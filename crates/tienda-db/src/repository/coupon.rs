//! # Coupon Repository
//!
//! Discount-code CRUD for the back office, lookup for the storefront, and the
//! guarded usage counter used by order confirmation.
//!
//! ## Usage Counter
//! ```text
//! UPDATE coupons SET used_count = used_count + 1
//!  WHERE code = :code
//!    AND (max_uses IS NULL OR used_count < max_uses)
//!      │
//!      ├── 1 row  ──► counted
//!      └── 0 rows ──► Exhausted (the confirming transaction rolls back)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::coupon::{evaluate, normalize_code, validate_code, validate_discount};
use tienda_core::error::CouponRejection;
use tienda_core::{CoreError, Coupon, DiscountType, Money, ValidationError};

const COUPON_COLUMNS: &str = r#"
    id, code, discount_type, discount_value, min_purchase_cents,
    max_discount_cents, valid_from, valid_until, max_uses, used_count,
    is_active, created_at
"#;

/// Admin coupon form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    /// Basis points for percentage coupons, cents for fixed ones.
    pub discount_value: i64,
    #[serde(default)]
    pub min_purchase_cents: i64,
    pub max_discount_cents: Option<i64>,
    /// Defaults to now.
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<i64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewCoupon {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_code(&self.code)?;
        validate_discount(self.discount_type, self.discount_value)?;
        if self.min_purchase_cents < 0 {
            return Err(ValidationError::MustBePositive {
                field: "min_purchase_cents".to_string(),
            });
        }
        if matches!(self.max_discount_cents, Some(cap) if cap <= 0) {
            return Err(ValidationError::MustBePositive {
                field: "max_discount_cents".to_string(),
            });
        }
        if matches!(self.max_uses, Some(uses) if uses <= 0) {
            return Err(ValidationError::MustBePositive {
                field: "max_uses".to_string(),
            });
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until < from {
                return Err(ValidationError::InvalidFormat {
                    field: "valid_until".to_string(),
                    reason: "must not be before valid_from".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Increments the usage counter of `code` on the caller's connection.
pub(crate) async fn increment_usage(conn: &mut SqliteConnection, code: &str) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE coupons SET used_count = used_count + 1
        WHERE code = ?1 AND (max_uses IS NULL OR used_count < max_uses)
        "#,
    )
    .bind(code)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        debug!(code, "Coupon usage counted");
        return Ok(());
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM coupons WHERE code = ?1")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    match exists {
        Some(_) => Err(CoreError::CouponRejected {
            code: code.to_string(),
            reason: CouponRejection::Exhausted,
        }
        .into()),
        None => Err(CoreError::CouponNotFound(code.to_string()).into()),
    }
}

pub(crate) async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Coupon>> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = ?1");
    let coupon = sqlx::query_as::<_, Coupon>(&sql)
        .bind(normalize_code(code))
        .fetch_optional(&mut *conn)
        .await?;
    Ok(coupon)
}

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Creates a coupon. The code is stored upper case.
    ///
    /// ## Errors
    /// - `UniqueViolation` if the code already exists
    pub async fn create(&self, input: &NewCoupon) -> DbResult<Coupon> {
        input.validate().map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let code = normalize_code(&input.code);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value, min_purchase_cents,
                max_discount_cents, valid_from, valid_until, max_uses, used_count,
                is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11)
            "#,
        )
        .bind(&id)
        .bind(&code)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_purchase_cents)
        .bind(input.max_discount_cents)
        .bind(input.valid_from.unwrap_or(now))
        .bind(input.valid_until)
        .bind(input.max_uses)
        .bind(input.is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", code.clone()),
            other => other,
        })?;

        info!(code = %code, "Coupon created");
        self.get(&id).await
    }

    /// Updates a coupon definition. The usage counter is kept.
    pub async fn update(&self, id: &str, input: &NewCoupon) -> DbResult<Coupon> {
        input.validate().map_err(CoreError::from)?;
        let code = normalize_code(&input.code);

        let result = sqlx::query(
            r#"
            UPDATE coupons SET
                code = ?2, discount_type = ?3, discount_value = ?4,
                min_purchase_cents = ?5, max_discount_cents = ?6,
                valid_from = COALESCE(?7, valid_from), valid_until = ?8,
                max_uses = ?9, is_active = ?10
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&code)
        .bind(input.discount_type)
        .bind(input.discount_value)
        .bind(input.min_purchase_cents)
        .bind(input.max_discount_cents)
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.max_uses)
        .bind(input.is_active)
        .execute(&self.pool)
        .await
        .map_err(|err| match DbError::from(err) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", code.clone()),
            other => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        self.get(id).await
    }

    pub async fn set_active(&self, id: &str, is_active: bool) -> DbResult<Coupon> {
        let result = sqlx::query("UPDATE coupons SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        info!(id = %id, is_active, "Coupon toggled");
        self.get(id).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        info!(id = %id, "Coupon deleted");
        Ok(())
    }

    /// All coupons, newest first.
    pub async fn list(&self) -> DbResult<Vec<Coupon>> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC");
        let coupons = sqlx::query_as::<_, Coupon>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(coupons)
    }

    /// Looks a coupon up by code as typed (case-insensitive).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        find_by_code(&mut conn, code).await
    }

    /// Checks a code against a cart subtotal and returns the discount it
    /// would grant. Nothing is counted until the order is paid.
    pub async fn validate_for(
        &self,
        code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> DbResult<(Coupon, Money)> {
        let coupon = self
            .get_by_code(code)
            .await?
            .ok_or_else(|| CoreError::CouponNotFound(normalize_code(code)))?;
        let discount = evaluate(&coupon, subtotal, now)?;
        Ok((coupon, discount))
    }

    async fn get(&self, id: &str) -> DbResult<Coupon> {
        let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1");
        sqlx::query_as::<_, Coupon>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Coupon", id))
    }
}
