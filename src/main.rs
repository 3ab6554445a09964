use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use prefs_portal::{
    auth::{AuthService, CredentialStore, Database, HashCost, Role},
    config::{checked_duration, AuthConfig, RateLimitConfig, ServerConfig},
    logging::setup_logging,
    servers::{ApiServer, AppState},
    ConfigError, Result,
};

#[derive(Parser, Debug)]
#[command(name = "prefs_portal", version, about = "Student/teacher preferences portal")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create a teacher account; self-registration only creates students
    AddTeacher {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TEACHER_PASSWORD")]
        password: String,
    },
}

#[derive(Args, Debug)]
struct Settings {
    /// Session signing secret, at least 32 bytes
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Session token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRES_IN_SECS", default_value_t = 3600)]
    jwt_expires_in_secs: i64,

    /// Session cookie lifetime in milliseconds
    #[arg(long, env = "COOKIE_EXPIRES_IN_MS", default_value_t = 3_600_000)]
    cookie_expires_in_ms: i64,

    /// Origin allowed to call the API with credentials
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    frontend_url: String,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short = 'p', long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "data/prefs_portal.db")]
    database_path: PathBuf,

    /// Consecutive failed logins before an account is locked
    #[arg(long, env = "MAX_LOGIN_ATTEMPTS", default_value_t = 5)]
    max_login_attempts: u32,

    #[arg(long, env = "LOCKOUT_MINUTES", default_value_t = 15)]
    lockout_minutes: i64,

    /// Mark cookies Secure
    #[arg(long, env = "PRODUCTION", default_value_t = false)]
    production: bool,

    /// Argon2 memory cost in KiB
    #[arg(long, env = "HASH_MEMORY_KIB")]
    hash_memory_kib: Option<u32>,

    /// Argon2 iteration count
    #[arg(long, env = "HASH_ITERATIONS")]
    hash_iterations: Option<u32>,

    /// Register/login requests allowed per client IP per window
    #[arg(long, env = "AUTH_RATE_LIMIT_MAX", default_value_t = 10)]
    auth_rate_limit_max: u32,

    #[arg(long, env = "AUTH_RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    auth_rate_limit_window_secs: u64,

    /// Fallback log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write rotated log files to this directory
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<PathBuf>,
}

impl Settings {
    fn auth_config(&self) -> std::result::Result<AuthConfig, ConfigError> {
        let secret = self.jwt_secret.clone().ok_or(ConfigError::MissingSecret)?;
        let mut config = AuthConfig::new(secret)?;

        config.session_ttl =
            checked_duration("JWT_EXPIRES_IN_SECS", self.jwt_expires_in_secs, Duration::try_seconds)?;
        config.cookie_ttl = checked_duration(
            "COOKIE_EXPIRES_IN_MS",
            self.cookie_expires_in_ms,
            Duration::try_milliseconds,
        )?;
        config.secure_cookies = self.production;
        config.max_login_attempts = self.max_login_attempts;
        config.lockout_duration =
            checked_duration("LOCKOUT_MINUTES", self.lockout_minutes, Duration::try_minutes)?;

        let defaults = HashCost::default();
        config.hash_cost = HashCost {
            memory_kib: self.hash_memory_kib.unwrap_or(defaults.memory_kib),
            iterations: self.hash_iterations.unwrap_or(defaults.iterations),
            parallelism: defaults.parallelism,
        };

        config.validate()?;
        Ok(config)
    }

    fn server_config(&self) -> std::result::Result<ServerConfig, ConfigError> {
        let config = ServerConfig {
            host: self.host.clone(),
            port: self.port,
            frontend_url: self.frontend_url.clone(),
            database_path: self.database_path.clone(),
            auth_rate_limit: RateLimitConfig {
                max_requests: self.auth_rate_limit_max,
                window: std::time::Duration::from_secs(self.auth_rate_limit_window_secs),
            },
        };
        config.auth_rate_limit.validate()?;
        Ok(config)
    }
}

fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::open(path)?;
    log::info!("Database ready at {}", path.display());
    Ok(db)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        log::error!("FATAL ERROR: {}", e);
        eprintln!("FATAL ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;

    let _logger = setup_logging(&settings.log_level, settings.log_dir.as_deref())?;

    let auth_config = settings.auth_config()?;
    let server_config = settings.server_config()?;
    log::info!("Loaded configuration: {:?}", auth_config);

    let db = open_database(&server_config.database_path)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            log::info!(
                "Environment: {}",
                if auth_config.secure_cookies { "production" } else { "development" }
            );
            let state = AppState::new(db, &auth_config, server_config.auth_rate_limit);
            ApiServer::new(server_config, state).start().await
        }
        Command::AddTeacher { username, password } => {
            let service = AuthService::from_config(CredentialStore::new(db), &auth_config);
            let account = service.provision(&username, &password, Role::Teacher).await?;
            log::info!(
                "SECURITY: Teacher account created: {} (ID: {})",
                account.username,
                account.id
            );
            println!("Created teacher '{}' with id {}", account.username, account.id);
            Ok(())
        }
    }
}
