use std::env;

use crate::errors::AppError;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: normalize_database_url(
                &env::var("DATABASE_URL").unwrap_or_else(|_| "appointments.db".to_string()),
            ),
        }
    }

    /// Resolves the connection string to a path the embedded SQLite store can open.
    pub fn sqlite_path(&self) -> Result<&str, AppError> {
        let url = self.database_url.as_str();
        if url.starts_with("postgresql://") {
            return Err(AppError::Config(
                "postgresql connection strings are not supported by the embedded store".to_string(),
            ));
        }
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        if path.is_empty() {
            return Err(AppError::Config("DATABASE_URL is empty".to_string()));
        }
        Ok(path)
    }
}

/// Hosted providers hand out `postgres://` URLs; drivers expect `postgresql://`.
pub fn normalize_database_url(url: &str) -> String {
    match url.strip_prefix("postgres://") {
        Some(rest) => format!("postgresql://{rest}"),
        None => url.to_string(),
    }
}
