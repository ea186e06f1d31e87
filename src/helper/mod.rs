pub mod admin_helpers;
pub mod catalog_helpers;
pub mod donation_helpers;
pub mod sanitization_helpers;
