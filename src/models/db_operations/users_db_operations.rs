use bcrypt::{hash, verify, BcryptError};
use chrono::Utc;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Result as RusqliteResult};

use crate::models::AdminUser;

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

pub fn create_admin(conn: &Connection, username: &str, password: &str) -> Result<(), RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, 'admin')",
        params![username, hashed_password],
    )?;
    Ok(())
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Option<AdminUser> {
    conn.query_row(
        "SELECT id, username, role, is_active, last_login_time FROM users WHERE username = ?1",
        [username],
        |row| {
            Ok(AdminUser {
                id: row.get(0)?,
                username: row.get(1)?,
                role: row.get(2)?,
                is_active: row.get(3)?,
                last_login_time: row.get(4)?,
            })
        },
    )
    .ok()
}

/// Verifies credentials against the stored bcrypt hash. Returns the role on
/// success so the session can record it once at entry.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Option<(String, String)> {
    let res: rusqlite::Result<(String, String, bool)> = conn.query_row(
        "SELECT password_hash, role, is_active FROM users WHERE username = ?1",
        [username],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );

    if let Ok((stored_hash, role, is_active)) = res {
        if is_active && verify(password, &stored_hash).unwrap_or(false) {
            return Some((username.to_string(), role));
        }
    }
    None
}

pub fn update_last_login_time(conn: &Connection, username: &str) -> Result<(), RusqliteError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE users SET last_login_time = ?1 WHERE username = ?2",
        params![now, username],
    )?;
    Ok(())
}

pub fn list_admin_usernames(conn: &Connection) -> Result<Vec<String>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT username FROM users WHERE role = 'admin' ORDER BY username")?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut usernames = Vec::new();
    for username in rows {
        usernames.push(username?);
    }
    Ok(usernames)
}

pub fn change_password(conn: &Connection, username: &str, new_password: &str) -> Result<usize, RusqliteError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2 AND role = 'admin'",
        params![hashed_password, username],
    )
}

pub fn read_setting(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
        .optional()
        .unwrap_or(None)
}

pub fn update_setting(conn: &Connection, key: &str, value: &str) -> RusqliteResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}
