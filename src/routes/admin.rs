use std::time::Duration;

use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use actix_web_lab::sse;
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServiceError;
use crate::helper::{admin_helpers, catalog_helpers};
use crate::middleware::AuthenticatedAdmin;
use crate::models::MediaSlot;
use crate::notify::{self, ChangeEvent};
use crate::AppState;

const SSE_BUFFER: usize = 16;
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
const SSE_LIVENESS: Duration = Duration::from_secs(30);

pub fn config_login(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(handle_admin_login))
        .route("/logout", web::post().to(handle_admin_logout));
}

pub fn config_dashboard(cfg: &mut web::ServiceConfig) {
    cfg.route("/donations", web::get().to(list_donations))
        .route("/donations/events", web::get().to(donation_events))
        .route("/media/{slot}", web::get().to(list_slot_media))
        .route("/media/{slot}/upload", web::post().to(upload_slot_media))
        .route("/media/{slot}/link", web::post().to(link_slot_media))
        .route("/media/{id}/delete", web::post().to(delete_media));
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn handle_admin_login(
    session: Session,
    pool: web::Data<crate::DbPool>,
    form: web::Json<LoginForm>,
) -> impl Responder {
    match admin_helpers::verify_admin_credentials(&pool, &form.username, &form.password) {
        Ok(Some((username, role))) => {
            if let Err(e) = admin_helpers::update_last_login(&pool, &username) {
                log::warn!("Could not record last login for '{}': {}", username, e);
            }
            if session.insert("username", &username).is_err()
                || session.insert("role", &role).is_err()
            {
                return HttpResponse::InternalServerError()
                    .json(json!({ "error": "Could not establish a session." }));
            }
            HttpResponse::Ok().json(json!({ "success": true, "username": username }))
        }
        Ok(None) => HttpResponse::Unauthorized()
            .json(json!({ "error": "Invalid credentials or account suspended." })),
        Err(e) => {
            log::error!("Login check failed: {}", e);
            e.error_response()
        }
    }
}

async fn handle_admin_logout(session: Session) -> impl Responder {
    session.clear();
    HttpResponse::Ok().json(json!({ "success": true }))
}

async fn list_donations(
    _admin: AuthenticatedAdmin,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let donations = match admin_helpers::fetch_all_donations(&pool) {
        Ok(donations) => donations,
        Err(e) => {
            log::error!("Failed to fetch donations: {}", e);
            return e.error_response();
        }
    };
    let summary = match admin_helpers::fetch_donation_summary(&pool) {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Failed to fetch donation summary: {}", e);
            return e.error_response();
        }
    };
    HttpResponse::Ok().json(json!({ "donations": donations, "summary": summary }))
}

/// SSE stream that fires whenever the donations table changes; the dashboard
/// re-fetches the listing on each signal.
async fn donation_events(_admin: AuthenticatedAdmin, state: web::Data<AppState>) -> impl Responder {
    let rx = state.events.subscribe();
    let (tx, stream) = sse::channel(SSE_BUFFER);
    actix_web::rt::spawn(notify::forward_events(rx, tx, SSE_LIVENESS, |event| {
        matches!(event, ChangeEvent::Donations)
    }));

    stream.with_keep_alive(SSE_KEEP_ALIVE)
}

fn parse_slot(raw: &str) -> Result<MediaSlot, HttpResponse> {
    raw.parse::<MediaSlot>().map_err(|_| {
        HttpResponse::BadRequest()
            .json(json!({ "error": format!("Unknown media slot '{}'.", raw) }))
    })
}

async fn list_slot_media(
    _admin: AuthenticatedAdmin,
    slot: web::Path<String>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let slot = match parse_slot(&slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };
    match catalog_helpers::list_by_slot(&pool, slot) {
        Ok(assets) => HttpResponse::Ok().json(assets),
        Err(e) => {
            log::error!("Failed to list media for slot '{}': {}", slot, e);
            e.error_response()
        }
    }
}

/// Buffers a multipart upload, enforcing the configured size cap per file
/// while chunks stream in, then hands the files to the catalog sequentially.
async fn upload_slot_media(
    _admin: AuthenticatedAdmin,
    slot: web::Path<String>,
    pool: web::Data<crate::DbPool>,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, actix_web::Error> {
    let slot = match parse_slot(&slot) {
        Ok(slot) => slot,
        Err(response) => return Ok(response),
    };

    let max_bytes = catalog_helpers::max_upload_bytes(&pool).map_err(|e| {
        log::error!("Could not read the upload size limit: {}", e);
        actix_web::error::ErrorInternalServerError("settings unavailable")
    })?;

    let mut caption: Option<String> = None;
    let mut files: Vec<catalog_helpers::UploadedFile> = Vec::new();

    while let Some(mut field) = payload.try_next().await? {
        let field_name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();

        if field_name == "caption" {
            let mut text = Vec::new();
            while let Some(chunk) = field.try_next().await? {
                text.extend_from_slice(&chunk);
            }
            caption = Some(String::from_utf8_lossy(&text).into_owned());
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            if (bytes.len() + chunk.len()) as u64 > max_bytes {
                return Ok(HttpResponse::BadRequest().json(json!({
                    "error": format!(
                        "File '{}' exceeds the upload limit of {} MB.",
                        file_name,
                        max_bytes / (1024 * 1024)
                    ),
                })));
            }
            bytes.extend_from_slice(&chunk);
        }
        files.push(catalog_helpers::UploadedFile { file_name, mime_type, bytes });
    }

    match catalog_helpers::store_assets(
        &pool,
        state.object_store.as_ref(),
        &state.events,
        slot,
        files,
        caption.as_deref(),
    ) {
        Ok(stored) => Ok(HttpResponse::Ok().json(json!({ "success": true, "assets": stored }))),
        Err(e @ ServiceError::Validation(_)) => {
            Ok(HttpResponse::BadRequest().json(json!({ "error": e.to_string() })))
        }
        Err(e) => {
            log::error!("Upload into slot '{}' failed: {}", slot, e);
            Ok(e.error_response())
        }
    }
}

#[derive(Deserialize)]
struct LinkForm {
    url: String,
    caption: Option<String>,
}

async fn link_slot_media(
    _admin: AuthenticatedAdmin,
    slot: web::Path<String>,
    pool: web::Data<crate::DbPool>,
    state: web::Data<AppState>,
    form: web::Json<LinkForm>,
) -> impl Responder {
    let slot = match parse_slot(&slot) {
        Ok(slot) => slot,
        Err(response) => return response,
    };

    match catalog_helpers::link_url(&pool, &state.events, slot, &form.url, form.caption.as_deref())
    {
        Ok(asset) => HttpResponse::Ok().json(json!({ "success": true, "asset": asset })),
        Err(e @ ServiceError::Validation(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Linking a URL into slot '{}' failed: {}", slot, e);
            e.error_response()
        }
    }
}

async fn delete_media(
    _admin: AuthenticatedAdmin,
    id: web::Path<String>,
    pool: web::Data<crate::DbPool>,
    state: web::Data<AppState>,
) -> impl Responder {
    match catalog_helpers::delete_asset(&pool, state.object_store.as_ref(), &state.events, &id) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e @ ServiceError::NotFound(_)) => {
            HttpResponse::NotFound().json(json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Deleting media asset '{}' failed: {}", id.as_str(), e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::payment::testing::ScriptedGateway;
    use crate::models::db_operations::users_db_operations;
    use crate::notify::ChangeHub;
    use crate::setup::db_setup;
    use crate::storage::FsObjectStore;
    use actix_session::{storage::CookieSessionStore, SessionExt, SessionMiddleware};
    use actix_web::{cookie::Key, test, App};
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;
    use rusqlite::Connection;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_pool(dir: &TempDir) -> crate::DbPool {
        let db_path = dir.path().join("site.db");
        {
            let mut conn = Connection::open(&db_path).unwrap();
            db_setup::setup_site_db(&mut conn).unwrap();
            users_db_operations::create_admin(&conn, "amira", "correct horse").unwrap();
        }
        let manager = SqliteConnectionManager::file(&db_path);
        Pool::builder().max_size(2).build(manager).unwrap()
    }

    fn app_state(dir: &TempDir) -> web::Data<crate::AppState> {
        web::Data::new(crate::AppState {
            object_store: Arc::new(FsObjectStore::new(
                dir.path().join("media"),
                "http://localhost:8080",
            )),
            payment: Arc::new(ScriptedGateway::succeeding("cs_test")),
            events: ChangeHub::new(),
        })
    }

    fn session_mw() -> SessionMiddleware<CookieSessionStore> {
        SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
            .cookie_secure(false)
            .build()
    }

    fn admin_scope() -> actix_web::Scope<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        web::scope("/admin")
            .wrap(session_mw())
            .configure(config_login)
            .service(
                web::scope("")
                    .guard(actix_web::guard::fn_guard(|ctx| {
                        crate::middleware::admin_guard(&ctx.get_session())
                    }))
                    .configure(config_dashboard),
            )
    }

    #[actix_web::test]
    async fn login_rejects_bad_credentials_and_accepts_good_ones() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(app_state(&dir))
                .service(admin_scope()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(serde_json::json!({ "username": "amira", "password": "wrong" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(serde_json::json!({ "username": "amira", "password": "correct horse" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["username"], "amira");
    }

    #[actix_web::test]
    async fn dashboard_routes_need_a_logged_in_session() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(app_state(&dir))
                .service(admin_scope()),
        )
        .await;

        // Without a session the guard keeps the route from matching at all.
        let req = test::TestRequest::get().uri("/admin/donations").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(serde_json::json!({ "username": "amira", "password": "correct horse" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let session_cookie = resp
            .response()
            .cookies()
            .next()
            .expect("login should set a session cookie")
            .into_owned();

        let req = test::TestRequest::get()
            .uri("/admin/donations")
            .cookie(session_cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["summary"]["count"], 0);
        assert!(body["donations"].as_array().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn linking_a_video_url_through_the_admin_api() {
        let dir = TempDir::new().unwrap();
        let pool = test_pool(&dir);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .app_data(app_state(&dir))
                .service(admin_scope()),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/admin/login")
            .set_json(serde_json::json!({ "username": "amira", "password": "correct horse" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let session_cookie = resp.response().cookies().next().unwrap().into_owned();

        let req = test::TestRequest::post()
            .uri("/admin/media/latest_video/link")
            .cookie(session_cookie.clone())
            .set_json(serde_json::json!({ "url": "https://youtu.be/abc123" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["asset"]["url"], "https://youtu.be/abc123");

        // Linking into a file-backed slot is rejected.
        let req = test::TestRequest::post()
            .uri("/admin/media/hero_video/link")
            .cookie(session_cookie)
            .set_json(serde_json::json!({ "url": "https://youtu.be/abc123" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
