//! Dispatch gates - collaborators consulted before metrics flow
//!
//! - `CapabilityProbe`: can the remote endpoint accept metrics at all?
//! - `SessionAuth`: is there an authenticated session to send them with?

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Capability probe consulted once per worker start
pub trait CapabilityProbe: Send + Sync {
    fn is_supported(&self) -> bool;
}

impl<F> CapabilityProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_supported(&self) -> bool {
        self()
    }
}

/// Authenticated-session source consulted by `Dispatcher::start`
pub trait SessionAuth: Send + Sync {
    /// Current session token, if any
    fn session_token(&self) -> Option<String>;

    fn has_authenticated_session(&self) -> bool {
        self.session_token().is_some()
    }
}

/// Session with a fixed token (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    token: Option<String>,
}

impl StaticSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Session that never authenticates
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// Build from an optional token; blank tokens count as absent
    pub fn from_option(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

impl SessionAuth for StaticSession {
    fn session_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Remote server version, `major.minor.patch`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion(pub u32, pub u32, pub u32);

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

impl FromStr for ServerVersion {
    type Err = ContractError;

    /// Missing components default to 0 (`"7.4"` == `7.4.0`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 3];
        for (idx, part) in s.trim().split('.').enumerate() {
            if idx >= 3 {
                return Err(ContractError::config_parse(format!(
                    "server version '{s}' has more than three components"
                )));
            }
            parts[idx] = part.parse().map_err(|_| {
                ContractError::config_parse(format!("invalid server version '{s}'"))
            })?;
        }
        Ok(Self(parts[0], parts[1], parts[2]))
    }
}

/// Probe that checks the remote server version
///
/// Metrics are accepted from `7.4.0` onwards. An unknown version is treated
/// as unsupported.
#[derive(Debug, Clone, Default)]
pub struct ServerVersionProbe {
    version: Option<ServerVersion>,
}

impl ServerVersionProbe {
    /// First server version accepting metrics
    pub const MIN_VERSION: ServerVersion = ServerVersion(7, 4, 0);

    pub fn new(version: Option<ServerVersion>) -> Self {
        Self { version }
    }

    pub fn version(&self) -> Option<ServerVersion> {
        self.version
    }
}

impl CapabilityProbe for ServerVersionProbe {
    fn is_supported(&self) -> bool {
        self.version.is_some_and(|v| v >= Self::MIN_VERSION)
    }
}
