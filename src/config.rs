use crate::model::{Channel, Portal};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Closed-open range of seconds a randomized delay is drawn from.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DelayRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl DelayRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn is_zero(&self) -> bool {
        self.max_secs <= 0.0
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_secs: f64,
    pub retry_jitter_secs: f64,
    pub warmup_delay: DelayRange,
    pub resolve_delay: DelayRange,
    pub search_delay: DelayRange,
    pub detail_delay: DelayRange,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_attempts: 3,
            retry_base_secs: 2.0,
            retry_jitter_secs: 1.0,
            warmup_delay: DelayRange::new(2.0, 4.0),
            resolve_delay: DelayRange::new(2.0, 4.0),
            search_delay: DelayRange::new(3.0, 7.0),
            detail_delay: DelayRange::new(3.0, 6.0),
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// No sleeping at all.
    #[cfg(test)]
    pub fn without_delays() -> Self {
        Self {
            retry_base_secs: 0.0,
            retry_jitter_secs: 0.0,
            warmup_delay: DelayRange::new(0.0, 0.0),
            resolve_delay: DelayRange::new(0.0, 0.0),
            search_delay: DelayRange::new(0.0, 0.0),
            detail_delay: DelayRange::new(0.0, 0.0),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub portals: Vec<Portal>,
    pub channel: Channel,
    pub locations: Vec<String>,
    pub pages: usize,
    pub fetch_details: bool,
    pub max_details: usize,
    pub proxy: Option<String>,
    pub proxy_pool: Vec<String>,
    pub strict_resolution: bool,
    pub output_dir: String,
    pub debug_html: bool,
    pub transport: TransportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            portals: vec![Portal::Rightmove],
            channel: Channel::Sale,
            locations: vec!["London".to_string()],
            pages: 5,
            fetch_details: true,
            max_details: 10,
            proxy: None,
            proxy_pool: Vec::new(),
            strict_resolution: false,
            output_dir: "output".to_string(),
            debug_html: false,
            transport: TransportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Detail fetches allowed per location; zero when detail fetching is off.
    pub fn detail_quota(&self) -> usize {
        if self.fetch_details { self.max_details } else { 0 }
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config: AppConfig = serde_json::from_str(content)?;
    if config.pages == 0 {
        return Err("`pages` must be a positive integer".into());
    }
    if config.transport.max_attempts == 0 {
        return Err("`transport.max_attempts` must be at least 1".into());
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg = parse_config(r#"{"locations": ["Leeds"], "portals": ["zoopla"]}"#).unwrap();
        assert_eq!(cfg.locations, vec!["Leeds".to_string()]);
        assert_eq!(cfg.portals, vec![Portal::Zoopla]);
        assert_eq!(cfg.pages, 5);
        assert_eq!(cfg.transport.max_attempts, 3);
        assert_eq!(cfg.detail_quota(), 10);
    }

    #[test]
    fn test_zero_pages_rejected() {
        assert!(parse_config(r#"{"pages": 0}"#).is_err());
    }

    #[test]
    fn test_detail_quota_disabled() {
        let cfg = parse_config(r#"{"fetch_details": false, "max_details": 7}"#).unwrap();
        assert_eq!(cfg.detail_quota(), 0);
    }
}
