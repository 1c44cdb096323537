use clap::{Parser, Subcommand};
use foodgram::db::schema;
use foodgram::server::config::ServerConfig;
use foodgram::services::auth_service;
use foodgram::web::{self, models::RegisterRequest};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create an admin account, or promote the account that owns the email
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "Admin")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn connect(config: &ServerConfig) -> Result<DatabaseConnection, sea_orm::DbErr> {
    let mut opt = ConnectOptions::new(config.database_url.to_owned());
    opt.max_connections(10).sqlx_logging(false);
    Database::connect(opt).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, draining connections.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    // Logging needs the log directory, so the config is read first and
    // failures before this point go to stderr.
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting foodgram, version: {}", env!("CARGO_PKG_VERSION"));

    let db_pool = match connect(&server_config).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            return Err(e.into());
        }
    };

    if server_config.auto_migrate {
        if let Err(e) = schema::create_tables(&db_pool).await {
            error!("Failed to create the database schema: {}", e);
            return Err(e.into());
        }
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::CreateAdmin {
            email,
            username,
            password,
            first_name,
            last_name,
        } => {
            let request = RegisterRequest {
                email: Some(email),
                username: Some(username),
                first_name: Some(first_name),
                last_name: Some(last_name),
                password: Some(password),
            };
            match auth_service::ensure_admin(&db_pool, &request, &server_config).await {
                Ok(user) => {
                    info!(user_id = user.id, username = %user.username, "Admin account ready.");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to create admin account: {}", e);
                    Err(e.into())
                }
            }
        }
        Command::Serve => {
            tokio::fs::create_dir_all(&server_config.media_dir).await?;

            let addr: SocketAddr = server_config.listen_addr.parse()?;
            let app = web::create_axum_router(db_pool, server_config.clone());

            info!("HTTP API listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(Box::new)?;
            info!("Server stopped.");
            Ok(())
        }
    }
}
