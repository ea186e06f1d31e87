use actix_session::{Session, SessionExt};
use actix_web::{dev, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

/// Extractor for handlers behind the admin session. Resolves only when the
/// session carries an admin login; everything else gets 401 before the
/// handler body runs.
#[derive(Serialize)]
pub struct AuthenticatedAdmin {
    pub username: String,
    pub role: String,
}

impl FromRequest for AuthenticatedAdmin {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        if let (Ok(Some(username)), Ok(Some(role))) = (
            session.get::<String>("username"),
            session.get::<String>("role"),
        ) {
            if role == "admin" {
                return ready(Ok(AuthenticatedAdmin { username, role }));
            }
        }
        ready(Err(actix_web::error::ErrorUnauthorized("Not logged in.")))
    }
}

pub fn admin_guard(session: &Session) -> bool {
    session.get::<String>("role").unwrap_or(None) == Some("admin".to_string())
}
