use crate::error::ServiceResult;
use crate::models::db_operations::{donations_db_operations, users_db_operations};
use crate::models::Donation;
use crate::DbPool;

/// Checks a login attempt and returns `(username, role)` when it succeeds.
/// Only active accounts with the admin role may enter the dashboard.
pub fn verify_admin_credentials(
    pool: &DbPool,
    username: &str,
    password: &str,
) -> ServiceResult<Option<(String, String)>> {
    let conn = pool.get()?;
    let verified = users_db_operations::verify_credentials(&conn, username, password)
        .filter(|(_, role)| role == "admin");
    Ok(verified)
}

pub fn update_last_login(pool: &DbPool, username: &str) -> ServiceResult<()> {
    let conn = pool.get()?;
    users_db_operations::update_last_login_time(&conn, username)?;
    Ok(())
}

pub fn fetch_all_donations(pool: &DbPool) -> ServiceResult<Vec<Donation>> {
    let conn = pool.get()?;
    Ok(donations_db_operations::read_all_donations(&conn)?)
}

pub fn fetch_donation_summary(
    pool: &DbPool,
) -> ServiceResult<donations_db_operations::DonationSummary> {
    let conn = pool.get()?;
    Ok(donations_db_operations::read_donation_summary(&conn)?)
}
