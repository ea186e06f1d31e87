use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionExt, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use clap::Parser;
use cofaith_backend::{
    adapter::channel_stats::ChannelStatsClient,
    adapter::mailer::ReceiptMailer,
    adapter::payment::StripeGateway,
    config::Config,
    middleware::admin_guard,
    notify::ChangeHub,
    routes,
    storage::FsObjectStore,
    AppState,
};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "cofaith_server", author, version, about = "Starts the Creatures of Faith web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    // Initialize logger using the value from config
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    fs::create_dir_all(&config.database_path)
        .expect("Failed to create database directory");
    fs::create_dir_all(&config.media_path)
        .expect("Failed to create media directory");

    let db_path = config.site_db_path();
    if !db_path.exists() {
        panic!(
            "FATAL: site.db not found at '{}'. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    let manager = SqliteConnectionManager::file(db_path);
    let pool = Pool::builder()
        .build(manager)
        .expect("FATAL: Failed to create Rusqlite connection pool.");

    let app_state = web::Data::new(AppState {
        object_store: Arc::new(FsObjectStore::new(
            PathBuf::from(&config.media_path),
            &config.resolved_public_base_url(),
        )),
        payment: Arc::new(StripeGateway::new(
            config.stripe_secret_key().map(|k| k.to_string()),
        )),
        events: ChangeHub::new(),
    });

    let channel_stats = web::Data::new(ChannelStatsClient::new(
        config.youtube_api_key().map(|k| k.to_string()),
        config.youtube_channel_id().map(|c| c.to_string()),
    ));
    let mailer = web::Data::new(ReceiptMailer::new());

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    println!("🚀 Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        let cors = {
            let allowed_origins_str = &config.allowed_origins;
            if allowed_origins_str.trim() == "*" {
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec![actix_web::http::header::AUTHORIZATION, actix_web::http::header::ACCEPT, actix_web::http::header::CONTENT_TYPE])
                    .supports_credentials()
                    .max_age(3600)
            } else {
                let mut cors = Cors::default();
                let origins: Vec<&str> = allowed_origins_str.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
                for origin in origins {
                    cors = cors.allowed_origin(origin);
                }
                cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec![actix_web::http::header::AUTHORIZATION, actix_web::http::header::ACCEPT, actix_web::http::header::CONTENT_TYPE])
                    .supports_credentials()
                    .max_age(3600)
            }
        };

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .app_data(app_state.clone())
            .app_data(channel_stats.clone())
            .app_data(mailer.clone())
            .configure(routes::public::config_api)
            .service(actix_files::Files::new("/media", &config.media_path))
            // Session management applies only to the admin surface.
            .service(
                web::scope("/admin")
                    .wrap(session_mw)
                    .configure(routes::admin::config_login)
                    .service(
                        web::scope("")
                            .guard(actix_web::guard::fn_guard(|ctx| admin_guard(&ctx.get_session())))
                            .configure(routes::admin::config_dashboard),
                    ),
            )
    })
    .bind(server_address)?
    .run()
    .await
}
