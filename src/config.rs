use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expire_minutes: i64,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: env_or("SERVER_HOST", "127.0.0.1"),
            server_port: parse_env("SERVER_PORT", "8000")?,
            database_url: env_or("DATABASE_URL", "sqlite://social_api.db?mode=rwc"),
            jwt_secret: env_or("JWT_SECRET_KEY", "changeme"),
            jwt_expire_minutes: parse_env("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "60")?,
            upload_dir: env_or("UPLOAD_DIR", "uploads"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", "26214400")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parse_env("DB_MIN_CONNECTIONS", "1")?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "30")?,
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", "100")?,
            rate_limit_window_secs: parse_env("RATE_LIMIT_WINDOW_SECS", "60")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: "changeme".to_string(),
            jwt_expire_minutes: 60,
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
            db_max_connections: 20,
            db_min_connections: 1,
            request_timeout_secs: 30,
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_address_joins_host_and_port() {
        let config = Config {
            server_host: "0.0.0.0".into(),
            server_port: 9000,
            ..Config::default()
        };
        assert_eq!(config.server_address(), "0.0.0.0:9000");
    }

    #[test]
    fn invalid_number_is_config_error() {
        std::env::set_var("SOCIAL_API_TEST_PORT", "not-a-port");
        let result: Result<u16, _> = parse_env("SOCIAL_API_TEST_PORT", "1");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
