use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use serde::Serialize;

use crate::models::{Donation, DonationStatus};

fn column_error(index: usize, message: String) -> RusqliteError {
    RusqliteError::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn row_to_donation(row: &Row) -> Result<Donation, RusqliteError> {
    let status_str: String = row.get(4)?;
    let status = status_str
        .parse::<DonationStatus>()
        .map_err(|_| column_error(4, format!("unknown donation status '{}'", status_str)))?;

    let created_at_str: String = row.get(6)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| column_error(6, format!("bad created_at timestamp: {}", e)))?;

    Ok(Donation {
        id: row.get(0)?,
        donor_name: row.get(1)?,
        email: row.get(2)?,
        amount_cents: row.get(3)?,
        status,
        payment_intent_ref: row.get(5)?,
        created_at,
    })
}

pub fn insert_donation(conn: &Connection, donation: &Donation) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO donations (id, donor_name, email, amount_cents, status, payment_intent_ref, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            donation.id,
            donation.donor_name,
            donation.email,
            donation.amount_cents,
            donation.status.as_str(),
            donation.payment_intent_ref,
            donation.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn read_donation(conn: &Connection, id: &str) -> Result<Option<Donation>, RusqliteError> {
    conn.query_row(
        "SELECT id, donor_name, email, amount_cents, status, payment_intent_ref, created_at
         FROM donations WHERE id = ?1",
        [id],
        |row| row_to_donation(row),
    )
    .optional()
}

pub fn read_all_donations(conn: &Connection) -> Result<Vec<Donation>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, donor_name, email, amount_cents, status, payment_intent_ref, created_at
         FROM donations ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([], |row| row_to_donation(row))?;

    let mut donations = Vec::new();
    for donation in rows {
        donations.push(donation?);
    }
    Ok(donations)
}

/// Guarded pending -> completed transition. The status check lives in the
/// WHERE clause so a repeated confirmation affects zero rows instead of
/// re-completing; the returned count tells the caller which case happened.
pub fn complete_donation(conn: &Connection, id: &str) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE donations SET status = 'completed' WHERE id = ?1 AND status = 'pending'",
        [id],
    )
}

#[derive(Debug, Serialize)]
pub struct DonationSummary {
    pub count: i64,
    pub total_cents: i64,
    pub completed_count: i64,
}

pub fn read_donation_summary(conn: &Connection) -> Result<DonationSummary, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(amount_cents), 0),
                COALESCE(SUM(status = 'completed'), 0)
         FROM donations",
        [],
        |row| {
            Ok(DonationSummary {
                count: row.get(0)?,
                total_cents: row.get(1)?,
                completed_count: row.get(2)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_site_db(&mut conn).unwrap();
        conn
    }

    fn donation(id: &str, cents: i64) -> Donation {
        Donation {
            id: id.to_string(),
            donor_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            amount_cents: cents,
            status: DonationStatus::Pending,
            payment_intent_ref: Some("cs_test_1".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn insert_and_read_back() {
        let conn = test_conn();
        insert_donation(&conn, &donation("d1", 5000)).unwrap();

        let read = read_donation(&conn, "d1").unwrap().unwrap();
        assert_eq!(read.amount_cents, 5000);
        assert_eq!(read.status, DonationStatus::Pending);
        assert_eq!(read.payment_intent_ref.as_deref(), Some("cs_test_1"));
    }

    #[test]
    fn zero_amount_violates_the_check_constraint() {
        let conn = test_conn();
        assert!(insert_donation(&conn, &donation("d1", 0)).is_err());
        assert!(insert_donation(&conn, &donation("d2", -100)).is_err());
    }

    #[test]
    fn completion_is_guarded_by_current_status() {
        let conn = test_conn();
        insert_donation(&conn, &donation("d1", 2500)).unwrap();

        assert_eq!(complete_donation(&conn, "d1").unwrap(), 1);
        // Second confirmation is a no-op, not a second transition.
        assert_eq!(complete_donation(&conn, "d1").unwrap(), 0);
        assert_eq!(
            read_donation(&conn, "d1").unwrap().unwrap().status,
            DonationStatus::Completed
        );
        // Unknown ids also affect zero rows.
        assert_eq!(complete_donation(&conn, "missing").unwrap(), 0);
    }

    #[test]
    fn summary_counts_and_totals() {
        let conn = test_conn();
        insert_donation(&conn, &donation("d1", 1000)).unwrap();
        insert_donation(&conn, &donation("d2", 5000)).unwrap();
        complete_donation(&conn, "d2").unwrap();

        let summary = read_donation_summary(&conn).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.total_cents, 6000);
        assert_eq!(summary.completed_count, 1);
    }
}
