use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domains::clustering::ClusterOptions;
use crate::domains::location::DEFAULT_IP_GEOLOCATION_URL;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub cluster_radius: f64,
    pub cluster_min_zoom: u8,
    pub cluster_max_zoom: u8,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub ip_geolocation_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            supabase_url: env::var("SUPABASE_URL").context("SUPABASE_URL must be set")?,
            supabase_anon_key: env::var("SUPABASE_ANON_KEY")
                .context("SUPABASE_ANON_KEY must be set")?,
            port: parse_var("PORT", 8080)?,
            request_timeout: Duration::from_millis(parse_var("REQUEST_TIMEOUT_MS", 10_000)?),
            retry_max_attempts: parse_var("RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay: Duration::from_millis(parse_var("RETRY_BASE_DELAY_MS", 1000)?),
            cluster_radius: parse_var("CLUSTER_RADIUS", 60.0)?,
            cluster_min_zoom: parse_var("CLUSTER_MIN_ZOOM", 0)?,
            cluster_max_zoom: parse_var("CLUSTER_MAX_ZOOM", 16)?,
            allowed_origins: parse_list(env::var("ALLOWED_ORIGINS").ok().as_deref()),
            ip_geolocation_url: env::var("IP_GEOLOCATION_URL")
                .unwrap_or_else(|_| DEFAULT_IP_GEOLOCATION_URL.to_string()),
        })
    }

    /// Clustering options from the `CLUSTER_*` variables, rejected when inconsistent.
    pub fn cluster_options(&self) -> Result<ClusterOptions> {
        let options = ClusterOptions {
            min_zoom: self.cluster_min_zoom,
            max_zoom: self.cluster_max_zoom,
            radius: self.cluster_radius,
            ..Default::default()
        };
        options
            .validate()
            .context("Invalid CLUSTER_MIN_ZOOM, CLUSTER_MAX_ZOOM or CLUSTER_RADIUS")?;
        Ok(options)
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert!(parse_list(None).is_empty());
        assert!(parse_list(Some(" , ")).is_empty());
        assert_eq!(
            parse_list(Some("https://kindr.app, http://localhost:5173")),
            vec!["https://kindr.app", "http://localhost:5173"]
        );
    }

    fn config_with_zoom(min_zoom: u8, max_zoom: u8) -> Config {
        Config {
            supabase_url: "https://abc.supabase.co".into(),
            supabase_anon_key: "anon".into(),
            port: 8080,
            request_timeout: Duration::from_secs(10),
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            cluster_radius: 60.0,
            cluster_min_zoom: min_zoom,
            cluster_max_zoom: max_zoom,
            allowed_origins: Vec::new(),
            ip_geolocation_url: DEFAULT_IP_GEOLOCATION_URL.into(),
        }
    }

    #[test]
    fn test_cluster_options_from_config() {
        let options = config_with_zoom(2, 14).cluster_options().unwrap();
        assert_eq!(options.min_zoom, 2);
        assert_eq!(options.max_zoom, 14);
        assert_eq!(options.radius, 60.0);
    }

    #[test]
    fn test_inverted_cluster_zoom_is_rejected() {
        assert!(config_with_zoom(10, 5).cluster_options().is_err());
        assert!(config_with_zoom(0, 31).cluster_options().is_err());
    }

    #[test]
    fn test_unset_var_uses_default() {
        let port: u16 = parse_var("KINDR_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }
}
