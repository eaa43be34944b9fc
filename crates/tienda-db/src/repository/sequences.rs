//! Human-readable document numbers, allocated inside the writing transaction
//! so a rolled-back sale never burns a number.

use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};

pub(crate) const LOCAL_SALE: &str = "local_sale";
pub(crate) const ORDER: &str = "order";

/// Increments the named counter and returns its new value.
pub(crate) async fn next_value(conn: &mut SqliteConnection, name: &str) -> DbResult<i64> {
    let value: Option<i64> =
        sqlx::query_scalar("UPDATE sequences SET value = value + 1 WHERE name = ?1 RETURNING value")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    value.ok_or_else(|| DbError::Internal(format!("sequence '{}' is missing", name)))
}

/// `V-000042` / `ORD-000042`.
pub(crate) fn format_number(prefix: &str, value: i64) -> String {
    format!("{}-{:06}", prefix, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number("V", 42), "V-000042");
        assert_eq!(format_number("ORD", 1_234_567), "ORD-1234567");
    }
}
