use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::adapter::mailer::ReceiptMailer;
use crate::adapter::payment::PaymentGateway;
use crate::error::{ServiceError, ServiceResult};
use crate::helper::sanitization_helpers;
use crate::models::db_operations::donations_db_operations;
use crate::models::{Donation, DonationStatus};
use crate::notify::ChangeHub;
use crate::DbPool;

/// Donor-submitted form payload. The amount arrives in major units (dollars)
/// and is converted to cents before anything else touches it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationRequest {
    pub donor_name: String,
    pub email: String,
    pub amount: f64,
}

/// Converts a major-unit amount to integer cents. Amounts that round below
/// one cent count as zero; amounts beyond the cents range are rejected with
/// their own message rather than the too-small one.
pub fn amount_to_cents(amount: f64) -> ServiceResult<i64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServiceError::Validation(
            "Please enter a donation amount greater than zero.".to_string(),
        ));
    }
    let cents = (amount * 100.0).round();
    if cents < 1.0 {
        return Err(ServiceError::Validation(
            "Please enter a donation amount greater than zero.".to_string(),
        ));
    }
    if cents > i64::MAX as f64 {
        return Err(ServiceError::Validation(
            "The donation amount is too large to process.".to_string(),
        ));
    }
    Ok(cents as i64)
}

fn validate_request(req: &DonationRequest) -> ServiceResult<(String, String)> {
    let donor_name = sanitization_helpers::strip_all_html(req.donor_name.trim());
    if donor_name.is_empty() {
        return Err(ServiceError::Validation("Please enter your name.".to_string()));
    }
    let email = req.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::Validation(
            "Please enter a valid email address.".to_string(),
        ));
    }
    Ok((donor_name, email))
}

/// Full donation intake: validate, tokenize through the payment gateway,
/// persist a pending row. A gateway failure leaves no row behind; an insert
/// failure after a successful gateway call is logged as a reconciliation gap
/// since the intent already exists processor-side.
pub async fn submit_donation(
    pool: &DbPool,
    gateway: &dyn PaymentGateway,
    events: &ChangeHub,
    req: DonationRequest,
) -> ServiceResult<Donation> {
    let (donor_name, email) = validate_request(&req)?;
    let amount_cents = amount_to_cents(req.amount)?;

    let client_secret = gateway.create_payment_intent(amount_cents).await?;

    let donation = Donation {
        id: Uuid::new_v4().to_string(),
        donor_name,
        email,
        amount_cents,
        status: DonationStatus::Pending,
        payment_intent_ref: Some(client_secret),
        created_at: Utc::now(),
    };

    let conn = pool.get()?;
    if let Err(e) = donations_db_operations::insert_donation(&conn, &donation) {
        log::error!(
            "Donation insert failed after a payment intent was created; \
             intent for {} cents needs manual reconciliation: {}",
            amount_cents,
            e
        );
        return Err(e.into());
    }

    events.publish_donations();
    Ok(donation)
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// This call performed the pending -> completed transition and sent the
    /// receipt.
    Completed,
    /// The donation was already completed; nothing was sent again.
    AlreadyCompleted,
}

/// Confirms a donation and dispatches the receipt. Safe to call repeatedly:
/// only the call that wins the guarded status transition sends mail.
pub fn confirm_receipt(
    pool: &DbPool,
    mailer: &ReceiptMailer,
    events: &ChangeHub,
    donation_id: &str,
) -> ServiceResult<ReceiptOutcome> {
    let conn = pool.get()?;
    let donation = donations_db_operations::read_donation(&conn, donation_id)?
        .ok_or_else(|| ServiceError::NotFound("donation".to_string()))?;

    match donation.status {
        DonationStatus::Completed => return Ok(ReceiptOutcome::AlreadyCompleted),
        DonationStatus::Failed => {
            return Err(ServiceError::Validation(
                "This donation was not successful, so no receipt can be sent.".to_string(),
            ))
        }
        DonationStatus::Pending => {}
    }

    if donations_db_operations::complete_donation(&conn, donation_id)? == 0 {
        // Lost the race to a concurrent confirmation.
        return Ok(ReceiptOutcome::AlreadyCompleted);
    }

    mailer.send_receipt(
        &donation.donor_name,
        &donation.email,
        donation.amount_cents,
        &donation.id,
    );
    events.publish_donations();
    Ok(ReceiptOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::payment::testing::ScriptedGateway;
    use crate::setup::db_setup;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;
    use rusqlite::Connection;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        pool: DbPool,
        events: ChangeHub,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("site.db");
        {
            let mut conn = Connection::open(&db_path).unwrap();
            db_setup::setup_site_db(&mut conn).unwrap();
        }
        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder().max_size(2).build(manager).unwrap();
        Fixture { _dir: dir, pool, events: ChangeHub::new() }
    }

    fn request(amount: f64) -> DonationRequest {
        DonationRequest {
            donor_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            amount,
        }
    }

    #[actix_web::test]
    async fn valid_donation_lands_pending_with_client_secret() {
        let f = fixture();
        let gateway = ScriptedGateway::succeeding("cs_test_abc");

        let donation = submit_donation(&f.pool, &gateway, &f.events, request(50.0))
            .await
            .unwrap();

        assert_eq!(donation.amount_cents, 5000);
        assert_eq!(donation.status, DonationStatus::Pending);
        assert_eq!(donation.payment_intent_ref.as_deref(), Some("cs_test_abc"));
        assert_eq!(*gateway.requested_amounts.lock().unwrap(), vec![5000]);

        let conn = f.pool.get().unwrap();
        let stored = donations_db_operations::read_donation(&conn, &donation.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, DonationStatus::Pending);
    }

    #[actix_web::test]
    async fn invalid_amounts_never_reach_the_gateway() {
        let f = fixture();
        let gateway = ScriptedGateway::succeeding("cs_test_abc");

        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY, 0.001] {
            let err = submit_donation(&f.pool, &gateway, &f.events, request(amount))
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(gateway.requested_amounts.lock().unwrap().is_empty());

        let conn = f.pool.get().unwrap();
        assert!(donations_db_operations::read_all_donations(&conn).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn blank_name_or_bad_email_is_rejected() {
        let f = fixture();
        let gateway = ScriptedGateway::succeeding("cs_test_abc");

        let mut req = request(10.0);
        req.donor_name = "   ".to_string();
        assert!(matches!(
            submit_donation(&f.pool, &gateway, &f.events, req).await,
            Err(ServiceError::Validation(_))
        ));

        let mut req = request(10.0);
        req.email = "not-an-email".to_string();
        assert!(matches!(
            submit_donation(&f.pool, &gateway, &f.events, req).await,
            Err(ServiceError::Validation(_))
        ));

        assert!(gateway.requested_amounts.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn gateway_failure_leaves_no_row() {
        let f = fixture();
        let gateway = ScriptedGateway::failing("card declined");

        let err = submit_donation(&f.pool, &gateway, &f.events, request(25.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Adapter(_)));

        let conn = f.pool.get().unwrap();
        assert!(donations_db_operations::read_all_donations(&conn).unwrap().is_empty());
    }

    #[actix_web::test]
    async fn unconfigured_gateway_surfaces_as_such() {
        let f = fixture();
        let gateway = ScriptedGateway::unconfigured();

        let err = submit_donation(&f.pool, &gateway, &f.events, request(25.0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AdapterNotConfigured));
    }

    #[test]
    fn oversized_amounts_get_their_own_rejection_message() {
        let err = amount_to_cents(f64::MAX).unwrap_err();
        match err {
            ServiceError::Validation(message) => {
                assert!(message.contains("too large"), "got: {}", message);
            }
            other => panic!("expected a validation error, got {:?}", other),
        }

        // Sub-cent amounts still report the too-small message.
        let err = amount_to_cents(0.001).unwrap_err();
        match err {
            ServiceError::Validation(message) => {
                assert!(message.contains("greater than zero"), "got: {}", message);
            }
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn fractional_amounts_round_to_the_nearest_cent() {
        let f = fixture();
        let gateway = ScriptedGateway::succeeding("cs_test_abc");

        let donation = submit_donation(&f.pool, &gateway, &f.events, request(19.995))
            .await
            .unwrap();
        assert_eq!(donation.amount_cents, 2000);
    }

    #[actix_web::test]
    async fn receipt_completes_once_and_only_once() {
        let f = fixture();
        let gateway = ScriptedGateway::succeeding("cs_test_abc");
        let mailer = ReceiptMailer::new();

        let donation = submit_donation(&f.pool, &gateway, &f.events, request(50.0))
            .await
            .unwrap();

        let first = confirm_receipt(&f.pool, &mailer, &f.events, &donation.id).unwrap();
        assert_eq!(first, ReceiptOutcome::Completed);

        let second = confirm_receipt(&f.pool, &mailer, &f.events, &donation.id).unwrap();
        assert_eq!(second, ReceiptOutcome::AlreadyCompleted);

        let conn = f.pool.get().unwrap();
        let stored = donations_db_operations::read_donation(&conn, &donation.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, DonationStatus::Completed);
    }

    #[test]
    fn receipt_for_unknown_donation_is_not_found() {
        let f = fixture();
        let mailer = ReceiptMailer::new();

        let err = confirm_receipt(&f.pool, &mailer, &f.events, "missing").unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn receipt_for_failed_donation_is_rejected() {
        let f = fixture();
        let mailer = ReceiptMailer::new();

        let conn = f.pool.get().unwrap();
        let donation = Donation {
            id: "d-failed".to_string(),
            donor_name: "Jane Doe".to_string(),
            email: "jane@example.com".to_string(),
            amount_cents: 1000,
            status: DonationStatus::Failed,
            payment_intent_ref: None,
            created_at: Utc::now(),
        };
        donations_db_operations::insert_donation(&conn, &donation).unwrap();
        drop(conn);

        let err = confirm_receipt(&f.pool, &mailer, &f.events, "d-failed").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
