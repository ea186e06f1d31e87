use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

use crate::models::{MediaAsset, MediaSlot};

fn column_error(index: usize, message: String) -> RusqliteError {
    RusqliteError::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

fn row_to_asset(row: &Row) -> Result<MediaAsset, RusqliteError> {
    let slot_str: String = row.get(1)?;
    let slot = slot_str
        .parse::<MediaSlot>()
        .map_err(|_| column_error(1, format!("unknown media slot '{}'", slot_str)))?;

    let created_at_str: String = row.get(7)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| column_error(7, format!("bad created_at timestamp: {}", e)))?;

    Ok(MediaAsset {
        id: row.get(0)?,
        slot,
        url: row.get(2)?,
        caption: row.get(3)?,
        file_name: row.get(4)?,
        mime_type: row.get(5)?,
        file_size: row.get(6)?,
        created_at,
    })
}

pub fn insert_media(conn: &Connection, asset: &MediaAsset) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO media (id, slot, url, caption, file_name, mime_type, file_size, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            asset.id,
            asset.slot.as_str(),
            asset.url,
            asset.caption,
            asset.file_name,
            asset.mime_type,
            asset.file_size,
            asset.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// All assets in a slot, newest first. Rowid breaks ties so that two inserts
/// within the same timestamp still come back in insertion order, reversed.
pub fn read_media_by_slot(conn: &Connection, slot: MediaSlot) -> Result<Vec<MediaAsset>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, slot, url, caption, file_name, mime_type, file_size, created_at
         FROM media WHERE slot = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt.query_map([slot.as_str()], |row| row_to_asset(row))?;

    let mut assets = Vec::new();
    for asset in rows {
        assets.push(asset?);
    }
    Ok(assets)
}

pub fn read_media_by_id(conn: &Connection, id: &str) -> Result<Option<MediaAsset>, RusqliteError> {
    conn.query_row(
        "SELECT id, slot, url, caption, file_name, mime_type, file_size, created_at
         FROM media WHERE id = ?1",
        [id],
        |row| row_to_asset(row),
    )
    .optional()
}

pub fn delete_media(conn: &Connection, id: &str) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM media WHERE id = ?1", [id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;
    use chrono::Duration;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_site_db(&mut conn).unwrap();
        conn
    }

    fn asset(id: &str, slot: MediaSlot, created_at: DateTime<Utc>) -> MediaAsset {
        MediaAsset {
            id: id.to_string(),
            slot,
            url: format!("http://localhost/media/{}/{}.jpg", slot.as_str(), id),
            caption: None,
            file_name: format!("{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            file_size: 1024,
            created_at,
        }
    }

    #[test]
    fn slot_listing_is_newest_first() {
        let conn = test_conn();
        let base = Utc::now();
        insert_media(&conn, &asset("a", MediaSlot::CauseImage, base - Duration::seconds(2))).unwrap();
        insert_media(&conn, &asset("b", MediaSlot::CauseImage, base - Duration::seconds(1))).unwrap();
        insert_media(&conn, &asset("c", MediaSlot::CauseImage, base)).unwrap();
        insert_media(&conn, &asset("other", MediaSlot::SynopsisImage, base)).unwrap();

        let listed = read_media_by_slot(&conn, MediaSlot::CauseImage).unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn same_timestamp_falls_back_to_insertion_order() {
        let conn = test_conn();
        let now = Utc::now();
        insert_media(&conn, &asset("first", MediaSlot::Presentation, now)).unwrap();
        insert_media(&conn, &asset("second", MediaSlot::Presentation, now)).unwrap();

        let listed = read_media_by_slot(&conn, MediaSlot::Presentation).unwrap();
        assert_eq!(listed[0].id, "second");
        assert_eq!(listed[1].id, "first");
    }

    #[test]
    fn empty_slot_is_an_empty_list_not_an_error() {
        let conn = test_conn();
        let listed = read_media_by_slot(&conn, MediaSlot::HeroVideo).unwrap();
        assert!(listed.is_empty());
    }

    #[test]
    fn delete_reports_affected_rows() {
        let conn = test_conn();
        insert_media(&conn, &asset("x", MediaSlot::HeaderLogo, Utc::now())).unwrap();
        assert_eq!(delete_media(&conn, "x").unwrap(), 1);
        assert_eq!(delete_media(&conn, "x").unwrap(), 0);
        assert!(read_media_by_id(&conn, "x").unwrap().is_none());
    }
}
