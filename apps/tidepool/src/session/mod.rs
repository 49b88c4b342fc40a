pub mod handle;
pub mod negotiator;

pub use handle::{ChannelSlot, SessionHandle};
pub use negotiator::{NegotiationError, negotiate};

use thiserror::Error;
use url::Url;

/// Connection settings for one playground gateway.
///
/// The base URL may be given as `http(s)` or `ws(s)`; each consumer converts
/// to the scheme family it needs. A bare `host:port` gets a scheme inferred
/// from whether the host looks local.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    base_url: Url,
}

impl SessionConfig {
    pub fn new(server_base_url: impl AsRef<str>) -> Result<Self, ConfigError> {
        // Allow a centralized override so callers and env stay consistent.
        let mut base = std::env::var("TIDEPOOL_SERVER_BASE")
            .ok()
            .and_then(|s| {
                let trimmed = s.trim().to_string();
                if trimmed.is_empty() { None } else { Some(trimmed) }
            })
            .unwrap_or_else(|| server_base_url.as_ref().trim().to_string());
        if base.is_empty() {
            return Err(ConfigError::InvalidBaseUrl(
                "server base url cannot be empty".into(),
            ));
        }
        if !base.contains("://") {
            let inferred_scheme = infer_scheme(&base);
            base = format!("{inferred_scheme}{base}");
        }
        let parsed = Url::parse(&base)
            .map_err(|err| ConfigError::InvalidBaseUrl(format!("invalid server url: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self { base_url: parsed })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with an HTTP-family scheme, for the request/response APIs.
    pub fn http_base(&self) -> Url {
        let mut url = self.base_url.clone();
        let mapped = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        };
        url.set_scheme(mapped).expect("http family scheme");
        url
    }

    /// WebSocket endpoint for one execution session, with the language
    /// embedded as a connection parameter.
    pub fn exec_url(&self, kind: SessionKind, language: &str) -> Result<Url, ConfigError> {
        let mut url = self
            .base_url
            .join(kind.endpoint_path())
            .map_err(|err| ConfigError::InvalidBaseUrl(format!("invalid exec endpoint: {err}")))?;
        let mapped = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => other,
        };
        url.set_scheme(mapped)
            .map_err(|_| ConfigError::InvalidBaseUrl("unsupported scheme".into()))?;
        url.query_pairs_mut().append_pair("lang", language);
        Ok(url)
    }
}

fn infer_scheme(base: &str) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    let host_lower = host_part.to_ascii_lowercase();
    if host_lower.starts_with("localhost")
        || host_lower == "0.0.0.0"
        || host_lower.starts_with("127.")
        || host_lower == "::1"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
        || host_lower
            .strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .map(|octet| (16..32).contains(&octet))
            .unwrap_or(false)
    {
        "http://"
    } else {
        "https://"
    }
}

/// What the caller wants from the gateway. Immutable once issued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionRequest {
    /// Run a batch of source code. Empty code is valid and forwarded as-is.
    Run { language: String, code: String },
    /// Attach an interactive terminal.
    Term { language: String },
}

impl SessionRequest {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionRequest::Run { .. } => SessionKind::Run,
            SessionRequest::Term { .. } => SessionKind::Term,
        }
    }

    pub fn language(&self) -> &str {
        match self {
            SessionRequest::Run { language, .. } => language,
            SessionRequest::Term { language } => language,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionKind {
    Run,
    Term,
}

impl SessionKind {
    fn endpoint_path(self) -> &'static str {
        match self {
            SessionKind::Run => "api/exec/run",
            SessionKind::Term => "api/exec/term",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionKind::Run => "run",
            SessionKind::Term => "term",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server base url: {0}")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_https_for_public_hosts() {
        assert_eq!(infer_scheme("play.example.com"), "https://");
        assert_eq!(infer_scheme("play.example.com/some/path"), "https://");
        assert_eq!(infer_scheme("13.215.162.4"), "https://");
    }

    #[test]
    fn defaults_to_http_for_local_hosts() {
        for host in [
            "localhost",
            "localhost:8080",
            "127.0.0.1",
            "127.0.0.1:8080",
            "0.0.0.0",
            "10.0.0.5",
            "192.168.1.10",
            "172.16.0.1",
            "172.31.255.255",
            "[::1]",
        ] {
            assert_eq!(infer_scheme(host), "http://");
        }
    }

    #[test]
    fn session_config_infers_scheme() {
        let https = SessionConfig::new("play.example.com").unwrap();
        assert_eq!(https.base_url().as_str(), "https://play.example.com/");

        let http = SessionConfig::new("localhost:8080").unwrap();
        assert_eq!(http.base_url().as_str(), "http://localhost:8080/");
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(matches!(
            SessionConfig::new("ftp://play.example.com"),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn exec_url_maps_scheme_and_embeds_language() {
        let config = SessionConfig::new("http://127.0.0.1:8080").unwrap();
        let run = config.exec_url(SessionKind::Run, "lua").unwrap();
        assert_eq!(run.as_str(), "ws://127.0.0.1:8080/api/exec/run?lang=lua");

        let term = config.exec_url(SessionKind::Term, "python").unwrap();
        assert_eq!(
            term.as_str(),
            "ws://127.0.0.1:8080/api/exec/term?lang=python"
        );
    }

    #[test]
    fn exec_url_uses_wss_for_https() {
        let config = SessionConfig::new("https://play.example.com").unwrap();
        let url = config.exec_url(SessionKind::Run, "golang").unwrap();
        assert_eq!(url.as_str(), "wss://play.example.com/api/exec/run?lang=golang");
    }

    #[test]
    fn ws_base_is_kept_for_exec_and_mapped_for_http() {
        let config = SessionConfig::new("ws://127.0.0.1:8080").unwrap();
        let exec = config.exec_url(SessionKind::Term, "bash").unwrap();
        assert_eq!(exec.scheme(), "ws");
        assert_eq!(config.http_base().scheme(), "http");
    }

    #[test]
    fn request_accessors() {
        let run = SessionRequest::Run {
            language: "lua".into(),
            code: "print(1)".into(),
        };
        assert_eq!(run.kind(), SessionKind::Run);
        assert_eq!(run.language(), "lua");

        let term = SessionRequest::Term {
            language: "bash".into(),
        };
        assert_eq!(term.kind(), SessionKind::Term);
        assert_eq!(term.language(), "bash");
    }
}
