use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub session_expiry_hours: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub client_url: String,
    pub storage_dir: String,
    pub public_url: String,
    pub max_upload_bytes: usize,
    pub rate_limit_per_minute: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let server_host = env_or("SERVER_HOST", "127.0.0.1");
        let server_port: u16 = parse_env("SERVER_PORT", "3000")?;

        Ok(Config {
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://{}:{}", server_host, server_port)),
            server_host,
            server_port,
            database_url: env_or("DATABASE_URL", "sqlite://chat.db?mode=rwc"),
            session_expiry_hours: parse_env("SESSION_EXPIRY_HOURS", "48")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parse_env("DB_MIN_CONNECTIONS", "1")?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "30")?,
            client_url: env_or("CLIENT_URL", "http://localhost:5173"),
            storage_dir: env_or("STORAGE_DIR", "./storage"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", "1048576")?,
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", "300")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &env_or(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        let port: u16 = parse_value("SERVER_PORT", " 8080 ").unwrap();
        assert_eq!(port, 8080);

        let err = parse_value::<u16>("SERVER_PORT", "eighty").unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("SERVER_PORT")));
    }
}
