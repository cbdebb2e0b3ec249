use analysis_orchestrator::AnalysisConfig;
use anyhow::{Context, Result};
use polygon_client::PolygonSettings;
use std::env;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub polygon: PolygonSettings,
    pub analysis: AnalysisConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string())
            .parse()
            .context("BIND_ADDR must be host:port")?;

        let api_key = env::var("POLYGON_API_KEY").context("POLYGON_API_KEY must be set")?;
        let polygon = PolygonSettings::new(api_key);
        let analysis = AnalysisConfig::from_env()?;

        Ok(Self {
            bind_addr,
            polygon,
            analysis,
        })
    }
}

pub fn log_format() -> LogFormat {
    LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse(""), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("text"), LogFormat::Pretty);
    }
}
