//! Key/value runtime settings persisted in the `settings` table.

use std::collections::HashMap;

use rusqlite::params;

use super::{now_rfc3339, Database, DatabaseError};

/// Returns every setting whose key starts with `prefix`.
pub fn get_prefixed(db: &Database, prefix: &str) -> Result<HashMap<String, String>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT key, value FROM settings WHERE substr(key, 1, length(?1)) = ?1")?;
        let rows = stmt
            .query_map(params![prefix], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<HashMap<String, String>, _>>()?;
        Ok(rows)
    })
}

/// Writes all pairs atomically.
pub fn set_many(db: &Database, pairs: &[(&str, &str)]) -> Result<(), DatabaseError> {
    db.with_tx(|tx| {
        let now = now_rfc3339();
        for (key, value) in pairs {
            tx.execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_many_overwrites() {
        let db = Database::open_in_memory().unwrap();
        assert!(get_prefixed(&db, "whatsapp.").unwrap().is_empty());

        set_many(&db, &[("whatsapp.phone_number_id", "123")]).unwrap();
        set_many(&db, &[("whatsapp.phone_number_id", "456")]).unwrap();

        let found = get_prefixed(&db, "whatsapp.").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found.get("whatsapp.phone_number_id").map(String::as_str),
            Some("456")
        );
    }

    #[test]
    fn test_get_prefixed() {
        let db = Database::open_in_memory().unwrap();
        set_many(
            &db,
            &[
                ("whatsapp.access_token", "t"),
                ("whatsapp.verify_token", "v"),
                ("shop.name", "x"),
            ],
        )
        .unwrap();

        let found = get_prefixed(&db, "whatsapp.").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("whatsapp.verify_token").map(String::as_str), Some("v"));
    }
}
