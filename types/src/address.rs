use std::fmt;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Host and port the application server binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl Default for ServerAddress {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URL an operator should open in a browser.
    ///
    /// Wildcard binds are not browsable, so they are shown as loopback.
    #[must_use]
    pub fn display_url(&self) -> String {
        let host = match self.host.trim() {
            "0.0.0.0" | "::" | "[::]" => DEFAULT_HOST,
            other => other,
        };
        if host.contains(':') && !host.starts_with('[') {
            format!("http://[{host}]:{}/", self.port)
        } else {
            format!("http://{host}:{}/", self.port)
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
