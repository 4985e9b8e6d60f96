//! The SQLite row schema of a dumped store.

use rusqlite::Connection;

use crate::error::{PersistError, Result};

/// Bumped on any incompatible change to the tables or the content JSON.
pub const SCHEMA_VERSION: i64 = 1;

/// State database file name inside a dump directory.
pub const STATE_FILE: &str = "melt_state.sqlite";

/// Bootstrap artifact listing the predefined objects.
pub const PREDEF_FILE: &str = "melt_predef.json";

/// Bootstrap artifact listing the known global names.
pub const GLOBALS_FILE: &str = "melt_globals.json";

const CREATE_SQL: &str = "\
CREATE TABLE IF NOT EXISTS t_objects (
    ob_id       TEXT PRIMARY KEY NOT NULL,
    ob_mtim     REAL NOT NULL,
    ob_content  TEXT NOT NULL,
    ob_paylkind TEXT,
    ob_payload  TEXT
);
CREATE TABLE IF NOT EXISTS t_globals (
    glob_name   TEXT PRIMARY KEY NOT NULL,
    glob_oid    TEXT NOT NULL
);
";

/// Create the tables and stamp the schema version.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Reject a store written by a different schema version.
pub fn check_schema(conn: &Connection) -> Result<()> {
    let found: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if found != SCHEMA_VERSION {
        return Err(PersistError::SchemaVersion {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_check() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        check_schema(&conn).unwrap();
    }

    #[test]
    fn check_rejects_foreign_version() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        assert!(matches!(
            check_schema(&conn),
            Err(PersistError::SchemaVersion { .. })
        ));
    }

    #[test]
    fn check_rejects_blank_database() {
        // A fresh database has user_version 0, never SCHEMA_VERSION.
        let conn = Connection::open_in_memory().unwrap();
        assert!(check_schema(&conn).is_err());
    }

    #[test]
    fn create_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        create_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO t_objects (ob_id, ob_mtim, ob_content) VALUES (?1, ?2, ?3)",
            rusqlite::params!["_x", 0.0, "{}"],
        )
        .unwrap();
    }
}
