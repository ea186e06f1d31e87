use clap::{Parser, Subcommand};
use cofaith_backend::config::Config;
use cofaith_backend::models::db_operations::users_db_operations;
use cofaith_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial site setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    match &cli.command {
        Commands::Db { action } => match action {
            DbAction::Setup => setup_site_database(&config),
        },
        Commands::Admin { action } => match action {
            AdminAction::Create { username, password } => {
                create_admin_user(&config, username, password);
            }
            AdminAction::List => {
                list_admin_users(&config);
            }
            AdminAction::ChangePassword { username, new_password } => {
                change_admin_password(&config, username, new_password);
            }
        },
    }
}

fn setup_site_database(config: &Config) {
    let db_path = config.site_db_path();
    if db_path.exists() {
        println!("ℹ️ Site database already exists at '{}'. Skipping creation.", db_path.display());
        return;
    }
    println!("\nSetting up site database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create site database file.");
    match db_setup::setup_site_db(&mut conn) {
        Ok(_) => println!("✅ Site database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up site database: {}", e),
    }
}

fn create_admin_user(config: &Config, username: &str, password: &str) {
    let db_path = config.site_db_path();
    if !db_path.exists() {
        eprintln!("❌ Error: Site database not found at '{}'. Please run `setup_cli db setup` first.", db_path.display());
        return;
    }
    let conn = Connection::open(&db_path).expect("Could not open site database.");
    match users_db_operations::create_admin(&conn, username, password) {
        Ok(_) => println!("✅ Admin user '{}' created successfully.", username),
        Err(e) => eprintln!("❌ Error creating admin user: {}. It might be because the username already exists.", e),
    }
}

fn list_admin_users(config: &Config) {
    let conn = match Connection::open(config.site_db_path()) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("❌ Error: Site database not found. Please run `setup_cli db setup` first.");
            return;
        }
    };
    println!("Listing Admin Users:");
    match users_db_operations::list_admin_usernames(&conn) {
        Ok(users) => {
            for user in users {
                println!("- {}", user);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn change_admin_password(config: &Config, username: &str, new_password: &str) {
    let conn = match Connection::open(config.site_db_path()) {
        Ok(c) => c,
        Err(_) => {
            eprintln!("❌ Error: Site database not found.");
            return;
        }
    };
    match users_db_operations::change_password(&conn, username, new_password) {
        Ok(0) => eprintln!("❌ Error: No admin user named '{}' found.", username),
        Ok(_) => println!("✅ Password for admin user '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
