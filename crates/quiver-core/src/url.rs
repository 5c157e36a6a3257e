//! Service URL - the configuration carrier for the whole runtime.
//!
//! A [`ServiceUrl`] is an immutable bag of `protocol`, `host`, `port`, `path`
//! and string parameters. Extension selection, activation filtering, and pool
//! sizing all read from it; nothing in the runtime writes to it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters escaped when rendering parameter keys and values.
const QUERY_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

/// Errors raised while parsing a [`ServiceUrl`] from text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    /// The text is not a parseable URL.
    #[error("invalid service url `{input}`: {source}")]
    Invalid {
        /// The offending input.
        input: String,
        /// Parser diagnostic.
        #[source]
        source: url::ParseError,
    },
    /// The URL has no scheme, which Quiver requires as the protocol name.
    #[error("service url `{0}` has no protocol")]
    MissingProtocol(String),
}

/// Immutable service URL: protocol, host, port, path and string parameters.
///
/// Equality is structural, parameters included; parameters are kept sorted so
/// two URLs built from the same pairs in any order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUrl {
    protocol: String,
    host: String,
    port: Option<u16>,
    path: String,
    parameters: BTreeMap<String, String>,
}

impl ServiceUrl {
    /// Create a URL with no parameters.
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: Option<u16>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: path.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add one parameter, builder style.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Replace the whole parameter map, builder style.
    pub fn with_parameters(mut self, parameters: BTreeMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Protocol (URL scheme), e.g. `injvm` or `registry`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Host, possibly empty for in-process URLs.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, if one was given.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Path with the leading slash stripped; conventionally the service
    /// interface name.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All parameters, sorted by key.
    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Look up one parameter.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Look up one parameter, falling back to `default`.
    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).unwrap_or(default)
    }

    /// Parse a parameter into `T`. Absent or unparseable values yield `None`;
    /// parse failures are logged, not raised.
    pub fn typed_parameter<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.parameter(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::debug!(key, raw, "ignoring unparseable url parameter");
                None
            }
        }
    }

    /// The string key under which a service addressed by this URL is exported
    /// into a protocol's shared exporter map.
    pub fn service_key(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.path, port),
            None => self.path.clone(),
        }
    }
}

impl FromStr for ServiceUrl {
    type Err = UrlError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parsed = url::Url::parse(input).map_err(|source| UrlError::Invalid {
            input: input.to_owned(),
            source,
        })?;
        if parsed.scheme().is_empty() {
            return Err(UrlError::MissingProtocol(input.to_owned()));
        }
        let parameters = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Ok(Self {
            protocol: parsed.scheme().to_owned(),
            host: parsed.host_str().unwrap_or_default().to_owned(),
            port: parsed.port(),
            path: parsed.path().trim_start_matches('/').to_owned(),
            parameters,
        })
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "/{}", self.path)?;
        for (i, (key, value)) in self.parameters.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(
                f,
                "{sep}{}={}",
                utf8_percent_encode(key, QUERY_ESCAPE),
                utf8_percent_encode(value, QUERY_ESCAPE)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_protocol_host_port_path_and_parameters() {
        let url: ServiceUrl = "injvm://127.0.0.1:20880/demo.EchoService?threads=8&filter=demo"
            .parse()
            .unwrap();
        assert_eq!(url.protocol(), "injvm");
        assert_eq!(url.host(), "127.0.0.1");
        assert_eq!(url.port(), Some(20880));
        assert_eq!(url.path(), "demo.EchoService");
        assert_eq!(url.parameter("threads"), Some("8"));
        assert_eq!(url.parameter("filter"), Some("demo"));
        assert_eq!(url.parameter("missing"), None);
    }

    #[test]
    fn typed_parameter_ignores_garbage() {
        let url = ServiceUrl::new("injvm", "localhost", None, "svc")
            .with_parameter("threads", "12")
            .with_parameter("queues", "not-a-number");
        assert_eq!(url.typed_parameter::<usize>("threads"), Some(12));
        assert_eq!(url.typed_parameter::<usize>("queues"), None);
        assert_eq!(url.typed_parameter::<usize>("absent"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let url = ServiceUrl::new("registry", "zk.example.com", Some(2181), "demo.Service")
            .with_parameter("group", "provider")
            .with_parameter("access log", "a&b");
        let reparsed: ServiceUrl = url.to_string().parse().unwrap();
        assert_eq!(reparsed, url);
    }

    #[test]
    fn service_key_includes_port_when_present() {
        let with_port = ServiceUrl::new("injvm", "localhost", Some(9000), "demo.Service");
        assert_eq!(with_port.service_key(), "demo.Service:9000");
        let without = ServiceUrl::new("injvm", "localhost", None, "demo.Service");
        assert_eq!(without.service_key(), "demo.Service");
    }
}
