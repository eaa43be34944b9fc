//! # Customer Repository
//!
//! Registered customers. Only registered customers can buy on account;
//! walk-in buyers are stored as a name/email snapshot on the sale itself.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tienda_core::validation::{validate_customer_name, validate_email};
use tienda_core::{CoreError, Customer, ValidationError};

const CUSTOMER_COLUMNS: &str = "id, name, email, phone, created_at";

/// Admin customer form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewCustomer {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_customer_name(&self.name)?;
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            validate_email(email)?;
        }
        Ok(())
    }

    fn email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, input: &NewCustomer) -> DbResult<Customer> {
        input.validate().map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO customers (id, name, email, phone, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(input.email())
        .bind(&input.phone)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(id = %id, name = %input.name, "Customer created");

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    /// Lists customers by name, optionally filtered by name or email.
    pub async fn list(&self, search: Option<&str>) -> DbResult<Vec<Customer>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        debug!(?search, "Listing customers");

        let sql = format!(
            r#"
            SELECT {CUSTOMER_COLUMNS} FROM customers
            WHERE ?1 IS NULL
               OR name LIKE '%' || ?1 || '%'
               OR email LIKE '%' || ?1 || '%'
            ORDER BY name
            "#
        );
        let customers = sqlx::query_as::<_, Customer>(&sql)
            .bind(search)
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    pub async fn update(&self, id: &str, input: &NewCustomer) -> DbResult<Customer> {
        input.validate().map_err(CoreError::from)?;

        let result = sqlx::query("UPDATE customers SET name = ?2, email = ?3, phone = ?4 WHERE id = ?1")
            .bind(id)
            .bind(input.name.trim())
            .bind(input.email())
            .bind(&input.phone)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::test_db;

    #[tokio::test]
    async fn test_create_search_update() {
        let db = test_db().await;
        let repo = db.customers();

        let ana = repo
            .insert(&NewCustomer {
                name: "Ana Gómez".to_string(),
                email: Some("  Ana@Example.com ".to_string()),
                phone: None,
            })
            .await
            .unwrap();
        assert_eq!(ana.email.as_deref(), Some("ana@example.com"));

        assert_eq!(repo.list(Some("gómez")).await.unwrap().len(), 1);
        assert_eq!(repo.list(Some("example")).await.unwrap().len(), 1);
        assert!(repo.list(Some("pérez")).await.unwrap().is_empty());

        let updated = repo
            .update(
                &ana.id,
                &NewCustomer {
                    name: "Ana María Gómez".to_string(),
                    email: None,
                    phone: Some("555-0101".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana María Gómez");
        assert!(updated.email.is_none());
    }

    #[tokio::test]
    async fn test_rejects_blank_name_and_bad_email() {
        let db = test_db().await;
        let repo = db.customers();

        let blank = repo.insert(&NewCustomer::default()).await.unwrap_err();
        assert!(matches!(blank, DbError::Domain(CoreError::Validation(_))));

        let bad_email = repo
            .insert(&NewCustomer {
                name: "Luis".to_string(),
                email: Some("not-an-email".to_string()),
                phone: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(bad_email, DbError::Domain(CoreError::Validation(_))));
    }
}
