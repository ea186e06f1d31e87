pub mod donations_db_operations;
pub mod media_db_operations;
pub mod users_db_operations;
