use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Directory holding the user and training catalogs, both registry
    /// files, and every content / range template they reference.
    pub database_dir: PathBuf,

    /// Address the HTTP front door listens on.
    pub bind_addr: String,

    // =========================
    // External services
    // =========================
    /// Endpoint of the content (LMS) service.
    pub content_server_url: String,

    /// Endpoint of the range instantiation service.
    pub instantiation_server_url: String,

    /// Per-call timeout toward the content service.
    pub content_timeout: Duration,

    /// Per-call timeout toward the instantiation service.
    ///
    /// Range creation clones whole guest images, so this is measured in
    /// minutes, not seconds.
    pub instantiation_timeout: Duration,

    // =========================
    // Sessions
    // =========================
    /// Highest range id the allocator may hand out. Also the number of
    /// sessions that can exist at once.
    pub max_sessions: u32,

    /// Log raw request parameters. Off by default since they may carry a
    /// password.
    pub log_params: bool,

    pub files: DatabaseFiles,
}

/// File names inside `database_dir`.
#[derive(Clone, Debug)]
pub struct DatabaseFiles {
    pub users: String,
    pub scenarios_en: String,
    pub scenarios_ja: String,
    pub active_sessions: String,
    pub saved_configurations: String,
}

impl Default for DatabaseFiles {
    fn default() -> Self {
        Self {
            users: "users.yml".to_string(),
            scenarios_en: "training-en.yml".to_string(),
            scenarios_ja: "training-ja.yml".to_string(),
            active_sessions: "active_sessions.yml".to_string(),
            saved_configurations: "saved_configurations.yml".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            database_dir: PathBuf::from(env_or("TRAINER_DATABASE_DIR", "database".to_string())),
            bind_addr: env_or("TRAINER_BIND_ADDR", "127.0.0.1:8082".to_string()),

            content_server_url: env_or("CONTENT_SERVER_URL", "http://127.0.0.1:8084".to_string()),
            instantiation_server_url: env_or(
                "INSTANTIATION_SERVER_URL",
                "http://127.0.0.1:8083".to_string(),
            ),
            content_timeout: Duration::from_secs(env_or("CONTENT_TIMEOUT_SECS", 120)),
            instantiation_timeout: Duration::from_secs(env_or("INSTANTIATION_TIMEOUT_SECS", 1_800)),

            max_sessions: env_or("TRAINER_MAX_SESSIONS", 100),
            log_params: env_or("TRAINER_LOG_PARAMS", false),

            files: DatabaseFiles::default(),
        }
    }

    pub fn active_sessions_path(&self) -> PathBuf {
        self.database_dir.join(&self.files.active_sessions)
    }

    pub fn saved_configurations_path(&self) -> PathBuf {
        self.database_dir.join(&self.files.saved_configurations)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            default
        }),
        Err(_) => default,
    }
}
