use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureConfig;
use crate::control::MemberProfile;

/// Top-level server config, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Listener overrides.
    pub server: Option<ServerSection>,
    /// Capture pipeline settings.
    pub capture: Option<CaptureSection>,
    /// Members provisioned at startup.
    #[serde(default)]
    pub members: Vec<MemberSeed>,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address to bind the HTTP/WS API server.
    pub bind: Option<SocketAddr>,
    /// Origins allowed for cross-origin requests (`"*"` for any).
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// `[capture]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    pub enabled: Option<bool>,
    /// Pipeline descriptor handed to the source factory.
    pub pipeline: Option<String>,
    pub start_timeout_ms: Option<u64>,
    pub idle_interval_ms: Option<u64>,
}

impl CaptureSection {
    /// Fold this section over the built-in defaults.
    pub fn to_capture_config(&self) -> CaptureConfig {
        let defaults = CaptureConfig::default();
        CaptureConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            pipeline: self.pipeline.clone().unwrap_or(defaults.pipeline),
            start_timeout: self
                .start_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.start_timeout),
            idle_interval: self
                .idle_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_interval),
        }
    }
}

/// `[[members]]` entry: a member provisioned at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSeed {
    pub id: Option<String>,
    #[serde(flatten)]
    pub profile: MemberProfile,
}

impl Config {
    /// Load config from a TOML file path. Returns None if file doesn't exist.
    pub fn load(path: &std::path::Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        Ok(Some(config))
    }

    pub fn capture_config(&self) -> CaptureConfig {
        self.capture
            .as_ref()
            .map(|section| section.to_capture_config())
            .unwrap_or_default()
    }
}

/// Errors that can occur when loading config.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(std::path::PathBuf, std::io::Error),
    ParseFailed(std::path::PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [capture]
            pipeline = "ffmpeg -f x11grab -i :0 -frames:v 1 -f image2 -"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let capture = config.capture_config();
        assert!(capture.enabled);
        assert!(capture.pipeline.starts_with("ffmpeg"));
        assert_eq!(capture.start_timeout, Duration::from_secs(1));
        assert_eq!(capture.idle_interval, Duration::from_secs(5));
        assert!(config.members.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            bind = "0.0.0.0:9000"
            cors_origins = ["*"]

            [capture]
            enabled = false
            pipeline = "grab"
            start_timeout_ms = 250
            idle_interval_ms = 2000

            [[members]]
            id = "admin"
            name = "Administrator"
            is_admin = true

            [[members]]
            name = "Guest"
            can_host = false
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.bind.unwrap().port(), 9000);
        assert_eq!(server.cors_origins, vec!["*"]);

        let capture = config.capture_config();
        assert!(!capture.enabled);
        assert_eq!(capture.start_timeout, Duration::from_millis(250));
        assert_eq!(capture.idle_interval, Duration::from_millis(2000));

        assert_eq!(config.members.len(), 2);
        assert_eq!(config.members[0].id.as_deref(), Some("admin"));
        assert!(config.members[0].profile.is_admin);
        assert!(config.members[1].id.is_none());
        assert!(!config.members[1].profile.can_host);
        assert!(config.members[1].profile.can_watch);
    }

    #[test]
    fn parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.server.is_none());
        assert!(config.capture.is_none());
        let capture = config.capture_config();
        assert!(capture.enabled);
        assert!(capture.pipeline.is_empty());
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(Config::load(&path).unwrap().is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrd.toml");
        std::fs::write(&path, "[capture]\npipeline = \"grab\"\n").unwrap();

        let config = Config::load(&path).unwrap().expect("config should load");
        assert_eq!(config.capture_config().pipeline, "grab");
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[capture\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(..)));
    }
}
