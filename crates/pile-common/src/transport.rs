use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Network transport the listener binds and the dialers connect over.
///
/// Names follow the conventional `tcp`/`udp` spelling, with the `4` and `6`
/// suffixes restricting address resolution to a single IP family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Transport {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    Unix,
}

/// IP family restriction implied by a transport name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Any,
    V4,
    V6,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown network {0:?} (expected tcp, tcp4, tcp6, udp, udp4, udp6 or unix)")]
pub struct TransportError(pub String);

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Tcp => "tcp",
            Transport::Tcp4 => "tcp4",
            Transport::Tcp6 => "tcp6",
            Transport::Udp => "udp",
            Transport::Udp4 => "udp4",
            Transport::Udp6 => "udp6",
            Transport::Unix => "unix",
        }
    }

    /// Connection-oriented transports have an accept step.
    pub fn is_stream(&self) -> bool {
        matches!(
            self,
            Transport::Tcp | Transport::Tcp4 | Transport::Tcp6 | Transport::Unix
        )
    }

    pub fn family(&self) -> Family {
        match self {
            Transport::Tcp4 | Transport::Udp4 => Family::V4,
            Transport::Tcp6 | Transport::Udp6 => Family::V6,
            Transport::Tcp | Transport::Udp | Transport::Unix => Family::Any,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Transport::Tcp),
            "tcp4" => Ok(Transport::Tcp4),
            "tcp6" => Ok(Transport::Tcp6),
            "udp" => Ok(Transport::Udp),
            "udp4" => Ok(Transport::Udp4),
            "udp6" => Ok(Transport::Udp6),
            "unix" => Ok(Transport::Unix),
            _ => Err(TransportError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Transport {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
