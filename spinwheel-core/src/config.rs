use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiCfg {
    /// Base URL of the spin backend, without a trailing slash (e.g. http://localhost:8080).
    pub root_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total timeout for non-streaming requests in milliseconds (default 60000ms).
    /// Streams are bounded by `StreamCfg::idle_timeout_ms` instead.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamCfg {
    /// Longest wait for the next complete frame, in milliseconds. 0 disables the limit.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Upper bound on nested `data:` markers stripped from one line.
    #[serde(default = "default_max_prefix_strips")]
    pub max_prefix_strips: usize,
}

impl Default for StreamCfg {
    fn default() -> Self {
        Self {
            idle_timeout_ms: default_idle_timeout_ms(),
            max_prefix_strips: default_max_prefix_strips(),
        }
    }
}

fn default_idle_timeout_ms() -> u64 {
    120_000
}
fn default_max_prefix_strips() -> usize {
    8
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub api: ApiCfg,
    /// HTTP client configuration (timeouts, pooling). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub stream: StreamCfg,
}

impl Config {
    /// Config with every optional section at its default.
    pub fn for_root_url(root_url: impl Into<String>) -> Self {
        Self {
            api: ApiCfg {
                root_url: root_url.into(),
            },
            http: HttpCfg::default(),
            stream: StreamCfg::default(),
        }
    }

    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::SpinError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::SpinError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::SpinError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::SpinError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::SpinError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::SpinError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_from_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("spin.json");
        let json = r#"{
          "api": {"root_url": "http://localhost:8080"},
          "stream": {"idle_timeout_ms": 30000}
        }"#;
        fs::write(&file, json).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.api.root_url, "http://localhost:8080");
        assert_eq!(cfg.stream.idle_timeout_ms, 30_000);
        assert_eq!(cfg.stream.max_prefix_strips, 8);
        assert_eq!(cfg.http.connect_timeout_ms, 5_000);
        assert_eq!(cfg.http.request_timeout_ms, 60_000);
        assert_eq!(cfg.http.pool_max_idle_per_host, None);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let missing = std::path::PathBuf::from("/definitely/not/here/spinwheel-missing.json");
        let err = Config::from_path(&missing).unwrap_err();
        match err {
            crate::error::SpinError::Io(_) => {}
            other => panic!("expected Io error, got: {:?}", other),
        }
    }

    #[test]
    fn bad_utf8_returns_other_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("bad.bin");
        fs::write(&file, vec![0xff, 0xfe, 0xfd, 0x00, 0x80]).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        match err {
            crate::error::SpinError::Other(_) => {}
            other => panic!("expected Other(utf8) error, got: {:?}", other),
        }
    }

    #[test]
    fn missing_api_section_is_rejected() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("noapi.json");
        fs::write(&file, r#"{"http": {"connect_timeout_ms": 10}}"#).unwrap();
        let err = Config::from_path(&file).unwrap_err();
        assert!(matches!(err, crate::error::SpinError::Other(_)));
    }

    #[test]
    fn load_from_toml() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("spin.toml");
        let toml = r#"
[api]
root_url = "https://spin.example"

[http]
connect_timeout_ms = 1000
pool_max_idle_per_host = 4

[stream]
max_prefix_strips = 3
"#;
        fs::write(&file, toml).unwrap();
        let cfg = Config::from_path(&file).unwrap();
        assert_eq!(cfg.api.root_url, "https://spin.example");
        assert_eq!(cfg.http.connect_timeout_ms, 1_000);
        assert_eq!(cfg.http.request_timeout_ms, 60_000);
        assert_eq!(cfg.http.pool_max_idle_per_host, Some(4));
        assert_eq!(cfg.stream.max_prefix_strips, 3);
        assert_eq!(cfg.stream.idle_timeout_ms, 120_000);
    }

    #[test]
    fn unknown_extension_falls_back_to_json_then_toml() {
        let dir = tempdir().unwrap();
        let json_path = dir.path().join("spin.conf");
        fs::write(&json_path, r#"{"api":{"root_url":"http://a"}}"#).unwrap();
        let cfg = Config::from_path(&json_path).unwrap();
        assert_eq!(cfg, Config::for_root_url("http://a"));

        let toml_path = dir.path().join("spin2.conf");
        fs::write(&toml_path, "[api]\nroot_url = \"http://b\"\n").unwrap();
        let cfg = Config::from_path(&toml_path).unwrap();
        assert_eq!(cfg.api.root_url, "http://b");
        assert_eq!(cfg.stream, StreamCfg::default());
    }
}
