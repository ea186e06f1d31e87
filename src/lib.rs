use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::adapter::payment::PaymentGateway;
use crate::notify::ChangeHub;
use crate::storage::ObjectStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared capabilities handed to every request handler: the object store,
/// the payment adapter, and the change-notification hub.
pub struct AppState {
    pub object_store: Arc<dyn ObjectStore>,
    pub payment: Arc<dyn PaymentGateway>,
    pub events: ChangeHub,
}

pub mod adapter;
pub mod config;
pub mod error;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod routes;
pub mod setup;
pub mod storage;
