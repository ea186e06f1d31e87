pub mod channel_stats;
pub mod mailer;
pub mod payment;
