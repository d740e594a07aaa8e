use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Mediscribe";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> String {
    "info,mediscribe=debug".to_string()
}

/// Get the application data directory (~/Mediscribe/)
pub fn app_data_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join("Mediscribe")
}

/// Runtime configuration, env-var overridable with sensible defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Local Ollama instance serving OCR (and Ollama-provider structuring).
    pub ollama_url: String,
    /// The pinned local transcription model.
    pub ocr_model: String,
    /// SQLite database file for confirmed records.
    pub db_path: PathBuf,
    /// Where uploaded documents are kept for review display.
    pub upload_dir: PathBuf,
    /// HTTP bind address.
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let data_dir = app_data_dir();
        Self {
            ollama_url: std::env::var("MEDISCRIBE_OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            ocr_model: std::env::var("MEDISCRIBE_OCR_MODEL")
                .unwrap_or_else(|_| "deepseek-ocr".to_string()),
            db_path: std::env::var("MEDISCRIBE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("records.db")),
            upload_dir: std::env::var("MEDISCRIBE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("uploads")),
            bind_addr: std::env::var("MEDISCRIBE_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
        }
    }
}
