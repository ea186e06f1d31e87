use rusqlite::{Connection, Result as RusqliteResult, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

pub fn setup_site_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'media' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS media (
            id TEXT PRIMARY KEY,
            slot TEXT NOT NULL CHECK(slot IN (
                'hero_video', 'header_logo', 'footer_logo', 'synopsis_image',
                'cause_image', 'presentation', 'latest_video', 'behind_scenes_video'
            )),
            url TEXT NOT NULL,
            caption TEXT,
            file_name TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'donations' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS donations (
            id TEXT PRIMARY KEY,
            donor_name TEXT NOT NULL,
            email TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK(amount_cents > 0),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK(status IN ('pending', 'completed', 'failed')),
            payment_intent_ref TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN ('admin')),
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login_time TEXT
        )",
        [],
    )?;

    println!("- Creating 'settings' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    seed_initial_settings(&tx)?;

    tx.commit()?;
    Ok(())
}

fn seed_initial_settings(tx: &Transaction) -> RusqliteResult<()> {
    println!("- Seeding initial settings...");
    let default_max_size = "10";
    tx.execute(
        "INSERT OR IGNORE INTO settings (key, value) VALUES ('max_file_upload_size_mb', ?1)",
        [&default_max_size],
    )?;
    println!("  > Default max file upload size set to: {} MB", default_max_size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_site_db(&mut conn).unwrap();
        setup_site_db(&mut conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };
        for table in ["donations", "media", "settings", "users"] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }

    #[test]
    fn unknown_slot_is_rejected_by_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_site_db(&mut conn).unwrap();

        let result = conn.execute(
            "INSERT INTO media (id, slot, url, file_name, mime_type, file_size, created_at)
             VALUES ('m1', 'no_such_slot', 'u', 'f', 'image/png', 1, '2026-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err());
    }
}
