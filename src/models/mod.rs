use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel mime type marking a catalog entry as a pointer to externally
/// hosted content rather than an object stored by this system.
pub const POINTER_MIME: &str = "text/url";

/// Logical content slots the site renders from. Each variant carries an
/// explicit policy row: whether it is URL-backed, whether multiple assets
/// are active at once, and which mime types uploads may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSlot {
    HeroVideo,
    HeaderLogo,
    FooterLogo,
    SynopsisImage,
    CauseImage,
    Presentation,
    LatestVideo,
    BehindScenesVideo,
}

impl MediaSlot {
    pub const ALL: [MediaSlot; 8] = [
        MediaSlot::HeroVideo,
        MediaSlot::HeaderLogo,
        MediaSlot::FooterLogo,
        MediaSlot::SynopsisImage,
        MediaSlot::CauseImage,
        MediaSlot::Presentation,
        MediaSlot::LatestVideo,
        MediaSlot::BehindScenesVideo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaSlot::HeroVideo => "hero_video",
            MediaSlot::HeaderLogo => "header_logo",
            MediaSlot::FooterLogo => "footer_logo",
            MediaSlot::SynopsisImage => "synopsis_image",
            MediaSlot::CauseImage => "cause_image",
            MediaSlot::Presentation => "presentation",
            MediaSlot::LatestVideo => "latest_video",
            MediaSlot::BehindScenesVideo => "behind_scenes_video",
        }
    }

    /// URL-backed slots hold pointer records only; no object is ever stored
    /// for them.
    pub fn is_url_only(&self) -> bool {
        matches!(self, MediaSlot::LatestVideo | MediaSlot::BehindScenesVideo)
    }

    /// Multi-valued slots render every asset at once, newest first. The
    /// single-valued slots keep history in storage but the site only uses
    /// the most recent entry.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, MediaSlot::CauseImage | MediaSlot::Presentation)
    }

    /// Mime prefixes accepted for uploads into this slot. Empty for
    /// URL-backed slots, which reject uploads outright.
    pub fn accepted_mime_prefixes(&self) -> &'static [&'static str] {
        match self {
            MediaSlot::HeroVideo => &["video/"],
            MediaSlot::HeaderLogo
            | MediaSlot::FooterLogo
            | MediaSlot::SynopsisImage
            | MediaSlot::CauseImage => &["image/"],
            MediaSlot::Presentation => &["image/", "application/pdf"],
            MediaSlot::LatestVideo | MediaSlot::BehindScenesVideo => &[],
        }
    }

    pub fn accepts_mime(&self, mime_type: &str) -> bool {
        self.accepted_mime_prefixes().iter().any(|p| mime_type.starts_with(p))
    }
}

impl fmt::Display for MediaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaSlot {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.as_str() == s)
            .ok_or(())
    }
}

/// One uploaded file or linked URL belonging to a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub slot: MediaSlot,
    pub url: String,
    pub caption: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
}

impl MediaAsset {
    pub fn is_pointer(&self) -> bool {
        self.mime_type == POINTER_MIME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Failed => "failed",
        }
    }
}

impl FromStr for DonationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DonationStatus::Pending),
            "completed" => Ok(DonationStatus::Completed),
            "failed" => Ok(DonationStatus::Failed),
            _ => Err(()),
        }
    }
}

/// A persisted donation attempt. Amounts are stored as integer cents; the
/// serialized form exposes major currency units to match the checkout API.
#[derive(Debug, Clone, Serialize)]
pub struct Donation {
    pub id: String,
    pub donor_name: String,
    pub email: String,
    #[serde(serialize_with = "serialize_cents_as_major")]
    #[serde(rename = "amount")]
    pub amount_cents: i64,
    pub status: DonationStatus,
    pub payment_intent_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn serialize_cents_as_major<S>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(*cents as f64 / 100.0)
}

#[derive(Debug, Serialize)]
pub struct AdminUser {
    pub id: i32,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_time: Option<String>,
}

pub mod db_operations;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trips_through_its_tag() {
        for slot in MediaSlot::ALL {
            assert_eq!(slot.as_str().parse::<MediaSlot>(), Ok(slot));
        }
        assert!("cover_art".parse::<MediaSlot>().is_err());
    }

    #[test]
    fn url_only_slots_reject_every_upload_mime() {
        assert!(MediaSlot::LatestVideo.is_url_only());
        assert!(!MediaSlot::LatestVideo.accepts_mime("video/mp4"));
        assert!(MediaSlot::HeroVideo.accepts_mime("video/mp4"));
        assert!(!MediaSlot::HeroVideo.accepts_mime("image/png"));
        assert!(MediaSlot::CauseImage.accepts_mime("image/jpeg"));
    }

    #[test]
    fn donation_amount_serializes_in_major_units() {
        let donation = Donation {
            id: "d1".into(),
            donor_name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            amount_cents: 5000,
            status: DonationStatus::Pending,
            payment_intent_ref: Some("cs_test_1".into()),
            created_at: chrono::Utc::now(),
        };
        let value = serde_json::to_value(&donation).unwrap();
        assert_eq!(value["amount"], serde_json::json!(50.0));
        assert_eq!(value["status"], "pending");
    }
}
