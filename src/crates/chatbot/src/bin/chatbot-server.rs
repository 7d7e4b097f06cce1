//! Chatbot server binary
//!
//! Serves the chat API and carries the operational subcommands: creating
//! an admin account, importing sample project data and checking the
//! external integrations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chatbot::api::{create_router, AppState};
use chatbot::auth::{generate_secret, hash_password, validate_registration, AuthManager};
use chatbot::config::{DataSourceKind, ServerConfig};
use chatbot::datasource::{GoogleSheetsClient, Record, SqlDatabaseClient};
use chatbot::db::repositories::{ProjectRepository, UserPreferenceRepository, UserRepository};
use chatbot::db::DatabaseConnection;
use chatbot::executor::ModelRouter;
use chatbot::search::GoogleSearchClient;
use chatbot::service::ChatbotService;
use clap::{Parser, Subcommand};
use llm::remote::{GeminiClient, OpenAiClient};
use llm::{ChatModel, ProviderKind, ProviderUtils};
use rand::distributions::{Alphanumeric, DistString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "chatbot-server")]
#[command(about = "Project data chatbot server", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, global = true, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve,

    /// Create an administrator account
    CreateAdmin {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Generated and printed when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Load projects and members from a JSON file into the spreadsheet
    ImportSampleData {
        #[arg(short, long, default_value = "sample_data.json")]
        file: PathBuf,

        /// Configured sheet name to write to
        #[arg(short, long, default_value = "default")]
        sheet: String,
    },

    /// Ping the chat providers and report search and Sheets configuration
    CheckIntegrations,
}

/// `{"projects": [...], "members": [...]}`
#[derive(Debug, Default, Deserialize)]
struct SampleData {
    #[serde(default)]
    projects: Vec<Record>,
    #[serde(default)]
    members: Vec<Record>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,chatbot=debug,tower_http=debug".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(&config, &username, &email, password).await,
        Commands::ImportSampleData { file, sheet } => import_sample_data(&config, &file, &sheet).await,
        Commands::CheckIntegrations => check_integrations(&config).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    info!("Loading server configuration...");
    let config = match path {
        Some(path) => ServerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ServerConfig::load().context("failed to load configuration")?,
    };
    info!(
        data_source = ?config.data.source,
        search_enabled = config.search.enabled,
        "Configuration loaded"
    );
    Ok(config)
}

async fn open_database(config: &ServerConfig) -> anyhow::Result<DatabaseConnection> {
    let database_url = config.database_url();
    info!("Connecting to database: {}", database_url);
    let db = DatabaseConnection::new(&database_url).await?;

    info!("Running database migrations");
    db.run_migrations().await?;
    db.health_check().await?;
    Ok(db)
}

fn provider_client(config: &ServerConfig, kind: ProviderKind) -> anyhow::Result<Option<Arc<dyn ChatModel>>> {
    let Some(remote) = config.providers.get(kind).remote_config(kind) else {
        warn!(provider = %kind, "No API key configured, provider disabled");
        return Ok(None);
    };
    let client: Arc<dyn ChatModel> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiClient::new(remote)?),
        ProviderKind::Gemini => Arc::new(GeminiClient::new(remote)?),
    };
    Ok(Some(client))
}

fn model_router(config: &ServerConfig) -> anyhow::Result<ModelRouter> {
    Ok(ModelRouter::new(
        provider_client(config, ProviderKind::OpenAi)?,
        provider_client(config, ProviderKind::Gemini)?,
    )
    .with_primary_retry(config.retry.primary.clone())
    .with_fallback_retry(config.retry.fallback.clone()))
}

fn sheets_client(config: &ServerConfig) -> anyhow::Result<GoogleSheetsClient> {
    let client = GoogleSheetsClient::new(&config.sheets, Duration::from_secs(config.data.cache_ttl_secs))?;
    if !client.is_configured() {
        warn!("Google Sheets is not configured; answers will carry no project data");
    }
    Ok(client)
}

async fn chatbot_service(config: &ServerConfig) -> anyhow::Result<ChatbotService> {
    let mut service = ChatbotService::new(
        model_router(config)?,
        sheets_client(config)?,
        Duration::from_secs(config.data.cache_ttl_secs),
    );

    if config.data.source == DataSourceKind::Sql {
        info!("Using SQL data source: {}", config.sql.url);
        service = service.with_sql(SqlDatabaseClient::connect_read_only(&config.sql.url).await?);
    }

    if config.search.enabled {
        let search = GoogleSearchClient::new(&config.search)?;
        if !search.is_configured() {
            warn!("Web search enabled but GOOGLE_SEARCH_API_KEY or GOOGLE_SEARCH_ENGINE_ID is missing");
        }
        service = service.with_search(search);
    }

    Ok(service)
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let db = open_database(&config).await?;
    let chatbot = chatbot_service(&config).await?;

    let ttl = Duration::from_secs(config.auth.token_ttl_secs);
    let auth = match config.jwt_secret() {
        Some(secret) => AuthManager::new(secret.as_bytes(), ttl),
        None => {
            warn!("JWT_SECRET not set; generated a random secret, tokens will not survive a restart");
            AuthManager::new(&generate_secret(), ttl)
        }
    };

    info!("Server name: {}", config.server.name);
    let state = AppState::new(db, chatbot, auth, config.chat.clone(), config.server.name.clone());
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Chatbot server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn create_admin(
    config: &ServerConfig,
    username: &str,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let db = open_database(config).await?;
    let pool = db.pool();

    if UserRepository::exists(pool, username).await? {
        warn!(username, "User already exists, nothing to do");
        return Ok(());
    }

    let password = match password {
        Some(password) => password,
        None => {
            let generated = Alphanumeric.sample_string(&mut rand::thread_rng(), 16);
            println!("Generated password for {}: {}", username, generated);
            generated
        }
    };
    if let Err(reason) = validate_registration(username, &password) {
        bail!(reason);
    }

    let hash = hash_password(&password)?;
    let user = UserRepository::create(pool, username, email, &hash, true).await?;
    UserPreferenceRepository::update(pool, user.id, None, Some(config.chat.default_model)).await?;

    info!(user_id = user.id, username, "Admin user created");
    println!("Admin user '{}' created", username);
    Ok(())
}

/// Header row (sorted field names) followed by one row per record.
fn records_to_rows(records: &[Record]) -> Vec<Vec<Value>> {
    let mut header: Vec<&String> = records.iter().flat_map(|r| r.keys()).collect();
    header.sort();
    header.dedup();

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(header.iter().map(|h| Value::String((*h).clone())).collect());
    for record in records {
        rows.push(
            header
                .iter()
                .map(|h| record.get(*h).cloned().unwrap_or_else(|| Value::String(String::new())))
                .collect(),
        );
    }
    rows
}

async fn import_sample_data(config: &ServerConfig, file: &Path, sheet: &str) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let data: SampleData = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid sample data", file.display()))?;
    info!(
        projects = data.projects.len(),
        members = data.members.len(),
        "Loaded sample data"
    );

    let sheets = sheets_client(config)?;
    if !sheets.is_configured() {
        bail!("Google Sheets is not configured; set GOOGLE_SHEETS_ID and credentials first");
    }

    let projects = sheets
        .import_sheet(Some(sheet), "Projects", records_to_rows(&data.projects))
        .await?;
    let members = sheets
        .import_sheet(Some(sheet), "Members", records_to_rows(&data.members))
        .await?;
    println!("Imported {} projects and {} members into '{}'", projects, members, sheet);

    let db = open_database(config).await?;
    let mirrored = ProjectRepository::upsert_from_records(db.pool(), &data.projects, &data.members).await?;
    println!("Mirrored {} projects into the local database", mirrored);
    Ok(())
}

async fn check_integrations(config: &ServerConfig) -> anyhow::Result<()> {
    let router = model_router(config)?;
    for kind in [ProviderKind::OpenAi, ProviderKind::Gemini] {
        let Some(client) = router.client(kind) else {
            println!("{:<8} not configured", kind.display_name());
            continue;
        };
        let info = client.model_info();
        let status = match client.ping().await {
            Ok(true) => format!("ok ({})", info.id),
            Ok(false) => format!("unreachable ({})", info.id),
            Err(e) => format!("error: {}", e),
        };
        println!("{:<8} {}", info.display_name, status);
    }

    let search = if !config.search.enabled {
        "disabled".to_string()
    } else if GoogleSearchClient::new(&config.search)?.is_configured() {
        "configured".to_string()
    } else {
        "enabled but missing API key or engine id".to_string()
    };
    println!("{:<8} {}", "Search", search);

    let sheets = sheets_client(config)?;
    let sheets_status = if sheets.is_configured() {
        format!("configured ({})", sheets.available_sheet_names().join(", "))
    } else {
        "not configured".to_string()
    };
    println!("{:<8} {}", "Sheets", sheets_status);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL-C signal, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM signal, shutting down");
        }
    }
}
