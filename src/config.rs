use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Runtime settings, read from `VOCAB_*` environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of `users.json`, `cards/` and `audio/`
    pub data_dir: PathBuf,
    pub bind_addr: String,
    /// Front-end assets served under `/static`
    pub static_dir: PathBuf,
    /// Mark the session cookie `Secure` (enable behind HTTPS)
    pub secure_cookies: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            data_dir: PathBuf::from(try_load("VOCAB_DATA_DIR", "data".to_string())),
            bind_addr: try_load("VOCAB_BIND_ADDR", "127.0.0.1:3000".to_string()),
            static_dir: PathBuf::from(try_load("VOCAB_STATIC_DIR", "static".to_string())),
            secure_cookies: try_load("VOCAB_SECURE_COOKIES", false),
        }
    }

    /// Defaults with every file rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bind_addr: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            secure_cookies: false,
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_data_dir() {
        let config = Config::with_data_dir("/tmp/vocab");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/vocab"));
        assert!(!config.secure_cookies);
    }
}
