use chrono::Utc;
use crate::errors::ConclaveError;
use crate::store::PersistenceStore;
use super::Database;

impl PersistenceStore for Database {
    fn save(&self, key: &str, value: &serde_json::Value) -> Result<(), ConclaveError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value.to_string(), Utc::now().to_rfc3339()],
        ).map_err(|e| ConclaveError::Persistence(format!("Insert failed: {}", e)))?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<serde_json::Value>, ConclaveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM records WHERE key = ?1")
            .map_err(|e| ConclaveError::Persistence(format!("Query failed: {}", e)))?;

        match stmt.query_row(rusqlite::params![key], |row: &rusqlite::Row| row.get::<_, String>(0)) {
            Ok(raw) => {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| ConclaveError::Persistence(format!("Corrupt record {}: {}", key, e)))?;
                Ok(Some(value))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ConclaveError::Persistence(format!("Query error: {}", e))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, ConclaveError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key FROM records WHERE key LIKE ?1 || '%' ORDER BY key")
            .map_err(|e| ConclaveError::Persistence(format!("Query failed: {}", e)))?;

        let rows = stmt.query_map(rusqlite::params![prefix], |row: &rusqlite::Row| {
            row.get::<_, String>(0)
        }).map_err(|e| ConclaveError::Persistence(format!("Query error: {}", e)))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| ConclaveError::Persistence(format!("Row error: {}", e)))?);
        }
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<bool, ConclaveError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM records WHERE key = ?1",
            rusqlite::params![key],
        ).map_err(|e| ConclaveError::Persistence(format!("Delete failed: {}", e)))?;
        Ok(affected > 0)
    }
}
