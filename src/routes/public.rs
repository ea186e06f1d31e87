use std::time::Duration;

use actix_web::{web, Either, HttpResponse, Responder, ResponseError};
use actix_web_lab::sse;
use serde::Deserialize;
use serde_json::json;

use crate::adapter::channel_stats::ChannelStatsClient;
use crate::adapter::mailer::ReceiptMailer;
use crate::error::ServiceError;
use crate::helper::{catalog_helpers, donation_helpers};
use crate::models::MediaSlot;
use crate::notify::{self, ChangeEvent};
use crate::AppState;

const SSE_BUFFER: usize = 16;
const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
const SSE_LIVENESS: Duration = Duration::from_secs(30);

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/is_server_active", web::get().to(is_server_active))
            .route("/media/{slot}", web::get().to(get_media_by_slot))
            .route("/media/{slot}/events", web::get().to(media_events))
            .route("/payments/intent", web::post().to(create_payment_intent))
            .route("/donations", web::post().to(submit_donation))
            .route("/donations/receipt", web::post().to(send_donation_receipt))
            .route("/channel", web::get().to(get_channel_stats)),
    );
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

fn parse_slot(raw: &str) -> Result<MediaSlot, HttpResponse> {
    raw.parse::<MediaSlot>()
        .map_err(|_| HttpResponse::BadRequest().json(json!({ "error": format!("Unknown media slot '{}'.", raw) })))
}

async fn get_media_by_slot(
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

/// SSE stream of change signals for one slot. Clients re-fetch the slot on
/// every event instead of applying deltas; a lagged subscriber only misses
/// duplicate signals.
pub async fn media_events(slot: web::Path<String>, state: web::Data<AppState>) -> impl Responder {
    let slot = match parse_slot(&slot) {
        Ok(slot) => slot,
        Err(response) => return Either::Left(response),
    };

    let rx = state.events.subscribe();
    let (tx, stream) = sse::channel(SSE_BUFFER);
    actix_web::rt::spawn(notify::forward_events(rx, tx, SSE_LIVENESS, move |event| {
        matches!(event, ChangeEvent::Media { slot: changed } if *changed == slot)
    }));

    Either::Right(stream.with_keep_alive(SSE_KEEP_ALIVE))
}

#[derive(Deserialize)]
struct PaymentIntentRequest {
    amount: f64,
}

/// Standalone payment-intent endpoint for widget-only flows. The response
/// mirrors the processor boundary: missing configuration is the caller's
/// 400, anything else is a 500.
async fn create_payment_intent(
    state: web::Data<AppState>,
    body: web::Json<PaymentIntentRequest>,
) -> impl Responder {
    let amount_cents = match donation_helpers::amount_to_cents(body.amount) {
        Ok(cents) => cents,
        Err(e) => return HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    };

    match state.payment.create_payment_intent(amount_cents).await {
        Ok(client_secret) => HttpResponse::Ok().json(json!({ "clientSecret": client_secret })),
        Err(ServiceError::AdapterNotConfigured) => HttpResponse::BadRequest()
            .json(json!({ "error": ServiceError::AdapterNotConfigured.to_string() })),
        Err(e) => {
            log::error!("Payment intent creation failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

async fn submit_donation(
    state: web::Data<AppState>,
    pool: web::Data<crate::DbPool>,
    body: web::Json<donation_helpers::DonationRequest>,
) -> impl Responder {
    match donation_helpers::submit_donation(
        &pool,
        state.payment.as_ref(),
        &state.events,
        body.into_inner(),
    )
    .await
    {
        Ok(donation) => HttpResponse::Ok().json(json!({
            "success": true,
            "donationId": donation.id,
            "clientSecret": donation.payment_intent_ref,
        })),
        Err(e @ ServiceError::Validation(_)) | Err(e @ ServiceError::AdapterNotConfigured) => {
            HttpResponse::BadRequest().json(json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Donation intake failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptRequest {
    donation_id: String,
}

async fn send_donation_receipt(
    state: web::Data<AppState>,
    pool: web::Data<crate::DbPool>,
    mailer: web::Data<ReceiptMailer>,
    body: web::Json<ReceiptRequest>,
) -> impl Responder {
    match donation_helpers::confirm_receipt(&pool, &mailer, &state.events, &body.donation_id) {
        Ok(_) => HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Receipt sent successfully",
        })),
        Err(e @ ServiceError::NotFound(_)) => {
            HttpResponse::NotFound().json(json!({ "error": e.to_string() }))
        }
        Err(e @ ServiceError::Validation(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": e.to_string() }))
        }
        Err(e) => {
            log::error!("Receipt confirmation failed for '{}': {}", body.donation_id, e);
            HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
        }
    }
}

#[derive(Deserialize)]
struct ChannelQuery {
    r#type: Option<String>,
}

/// Channel statistics proxy. An unconfigured API key is a soft condition:
/// the page still renders, so the response is a 200 with zeroed stats.
async fn get_channel_stats(
    channel: web::Data<ChannelStatsClient>,
    query: web::Query<ChannelQuery>,
) -> impl Responder {
    let unconfigured = json!({
        "error": "YouTube API key not configured",
        "subscribers": "0",
        "videos": [],
    });

    match query.r#type.as_deref() {
        Some("subscribers") => match channel.subscriber_count().await {
            Ok(subscribers) => HttpResponse::Ok().json(json!({ "subscribers": subscribers })),
            Err(ServiceError::AdapterNotConfigured) => HttpResponse::Ok().json(unconfigured),
            Err(e) => {
                log::error!("Subscriber count fetch failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        },
        Some("videos") => match channel.latest_videos().await {
            Ok(videos) => HttpResponse::Ok().json(json!({ "videos": videos })),
            Err(ServiceError::AdapterNotConfigured) => HttpResponse::Ok().json(unconfigured),
            Err(e) => {
                log::error!("Latest videos fetch failed: {}", e);
                HttpResponse::InternalServerError().json(json!({ "error": e.to_string() }))
            }
        },
        _ => HttpResponse::BadRequest().json(json!({ "error": "Invalid request type" })),
    }
}
