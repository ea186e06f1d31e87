use chrono::Utc;

/// Receipt notification dispatch. No mail service is wired up yet, so the
/// receipt is logged; the call site treats dispatch as best-effort either way.
pub struct ReceiptMailer;

impl ReceiptMailer {
    pub fn new() -> Self {
        ReceiptMailer
    }

    pub fn send_receipt(&self, donor_name: &str, email: &str, amount_cents: i64, donation_id: &str) {
        // TODO: integrate a transactional mail provider; until then the
        // receipt payload goes to the log so completions stay auditable.
        log::info!(
            "Donation receipt: donor={} email={} amount_usd={:.2} donation_id={} date={}",
            donor_name,
            email,
            amount_cents as f64 / 100.0,
            donation_id,
            Utc::now().to_rfc3339(),
        );
    }
}

impl Default for ReceiptMailer {
    fn default() -> Self {
        Self::new()
    }
}
