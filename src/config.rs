use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// directory uploaded files are written to
    pub files_dir: PathBuf,
    /// server bind address
    pub host: String,
    /// server port
    pub port: u16,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// api-key hash -> username, from UPLOAD_USERS
    pub users: HashMap<String, String>,
    /// cors allowed origins (comma-separated)
    pub cors_origins: Vec<String>,
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        // UPLOAD_USERS is comma-separated user:api-key pairs; keys are
        // stored hashed, never in the clear
        let users_raw = std::env::var("UPLOAD_USERS").unwrap_or_else(|_| {
            tracing::warn!(
                "⚠️  No UPLOAD_USERS set! Using default 'demo:changeme' - CHANGE THIS IN PRODUCTION!"
            );
            "demo:changeme".to_string()
        });
        let users = Self::parse_users(&users_raw);

        // parse cors origins
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            files_dir: std::env::var("FILES_DIR")
                .unwrap_or_else(|_| "./files".to_string())
                .into(),
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4848),
            worker_threads: std::env::var("WORKER_THREADS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(8),
            users,
            cors_origins,
        }
    }

    /// parse "alice:key1,bob:key2" into a hash -> username table
    pub fn parse_users(raw: &str) -> HashMap<String, String> {
        raw.split(',')
            .filter_map(|pair| {
                let (user, key) = pair.trim().split_once(':')?;
                let user = user.trim();
                let key = key.trim();
                if user.is_empty() || key.is_empty() {
                    None
                } else {
                    Some((Self::hash_api_key(key), user.to_string()))
                }
            })
            .collect()
    }

    // hash api key using sha256
    pub fn hash_api_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }
}
