//! Per-connection authentication state machine.
//!
//! States: `Unauthenticated → LocalhostExempt → Authenticated → LoggedOut`,
//! with `Unauthenticated → Authenticated` as the direct path once any user
//! exists. The localhost exception is a bootstrap allowance: it applies only
//! while no user exists anywhere in the deployment and is permanently
//! revoked, for every connection including the one that just used it, the
//! instant the first user is created.

mod authenticator;
mod subject;

pub use authenticator::*;
pub use subject::*;


use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    LocalhostExempt,
    Authenticated,
    LoggedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    X509,
    ScramSha1,
}

impl AuthMechanism {
    pub fn label(&self) -> &'static str {
        match self {
            AuthMechanism::X509 => "MONGODB-X509",
            AuthMechanism::ScramSha1 => "SCRAM-SHA-1",
        }
    }
}

/// Where a connection came from, as the server sees it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOrigin {
    pub loopback: bool,
    pub client_addr: String,
    /// Subject of the client certificate presented during the TLS handshake
    pub client_cert_subject: Option<String>,
}

impl ConnectionOrigin {
    pub fn loopback_with_cert(subject: &str) -> Self {
        Self {
            loopback: true,
            client_addr: "127.0.0.1:54321".to_string(),
            client_cert_subject: Some(subject.to_string()),
        }
    }

    pub fn loopback_plain() -> Self {
        Self {
            loopback: true,
            client_addr: "127.0.0.1:54321".to_string(),
            client_cert_subject: None,
        }
    }

    pub fn remote_plain() -> Self {
        Self {
            loopback: false,
            client_addr: "10.1.2.3:54321".to_string(),
            client_cert_subject: None,
        }
    }
}

/// A user declaration, as handed to `createUser`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSpec {
    pub name: String,
    #[serde(default)]
    pub pwd: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl UserSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pwd: None,
            roles: Vec::new(),
        }
    }

    pub fn with_password(
        name: &str,
        pwd: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            pwd: Some(pwd.to_string()),
            roles: Vec::new(),
        }
    }
}

/// Per-connection authentication state. Created on connection open,
/// destroyed on close, mutated only by the [`Authenticator`].
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub connection_id: String,
    pub principal: Option<String>,
    pub mechanism: Option<AuthMechanism>,
    pub state: AuthState,
    pub origin: ConnectionOrigin,
}
