use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use nanoid::nanoid;
use tracing::debug;
use tracing::info;

use super::AuthMechanism;
use super::AuthSession;
use super::AuthState;
use super::ConnectionOrigin;
use super::UserSpec;
use super::X509Subject;
use crate::constants::EXTERNAL_AUTH_DB;
use crate::AuthError;
use crate::SecurityConfig;

/// What an operation needs from the session before the dispatcher will run
/// it. `UserAdmin` is the only level the localhost exception satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRequest {
    UserAdmin,
    Operate,
}

/// Deployment-wide authentication state: the user registry plus every open
/// session. One authenticator serves a whole simulated cluster.
pub struct Authenticator {
    enabled: bool,
    server_subject: X509Subject,
    users: DashMap<(String, String), UserSpec>,
    user_ever_created: AtomicBool,
    sessions: DashMap<String, AuthSession>,
}

impl Authenticator {
    pub fn new(security: &SecurityConfig) -> Self {
        Self {
            enabled: security.auth_enabled,
            server_subject: X509Subject::parse(&security.server_x509_subject),
            users: DashMap::new(),
            user_ever_created: AtomicBool::new(false),
            sessions: DashMap::new(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Opens a session for a new connection. Sessions start
    /// `Unauthenticated`; the localhost exemption is evaluated lazily so a
    /// user created elsewhere revokes it for already-open connections too.
    pub fn open_session(
        &self,
        origin: ConnectionOrigin,
    ) -> String {
        let connection_id = nanoid!();
        self.sessions.insert(
            connection_id.clone(),
            AuthSession {
                connection_id: connection_id.clone(),
                principal: None,
                mechanism: None,
                state: AuthState::Unauthenticated,
                origin,
            },
        );
        connection_id
    }

    pub fn close_session(
        &self,
        connection_id: &str,
    ) {
        self.sessions.remove(connection_id);
    }

    pub fn session(
        &self,
        connection_id: &str,
    ) -> std::result::Result<AuthSession, AuthError> {
        self.sessions
            .get(connection_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| AuthError::UnknownConnection(connection_id.to_string()))
    }

    /// Effective state of the connection. An `Unauthenticated` loopback
    /// session reads as `LocalhostExempt` only while no user has ever been
    /// created anywhere in the deployment.
    pub fn effective_state(
        &self,
        connection_id: &str,
    ) -> std::result::Result<AuthState, AuthError> {
        let session = self.session(connection_id)?;
        if session.state == AuthState::Unauthenticated
            && session.origin.loopback
            && !self.user_ever_created.load(Ordering::Acquire)
        {
            return Ok(AuthState::LocalhostExempt);
        }
        Ok(session.state)
    }

    /// Gate an operation on the session's effective state.
    pub fn authorize(
        &self,
        connection_id: &str,
        request: AccessRequest,
    ) -> std::result::Result<(), AuthError> {
        if !self.enabled {
            return Ok(());
        }
        match self.effective_state(connection_id)? {
            AuthState::Authenticated => Ok(()),
            AuthState::LocalhostExempt if request == AccessRequest::UserAdmin => Ok(()),
            state => Err(AuthError::Unauthorized(format!(
                "operation requires authentication (connection state: {:?})",
                state
            ))),
        }
    }

    /// Creates a user. For `$external` users the name is an X.509 subject
    /// and must not collide with the server's own identity or the pattern
    /// reserved for inter-node communication.
    ///
    /// Side effect: the first successful creation permanently revokes the
    /// localhost exception, deployment-wide.
    pub fn create_user(
        &self,
        db: &str,
        user: UserSpec,
    ) -> std::result::Result<(), AuthError> {
        if db == EXTERNAL_AUTH_DB {
            let subject = X509Subject::parse(&user.name);
            if self.server_subject.same_organizational_identity(&subject) {
                return Err(AuthError::ReservedPrincipal(user.name));
            }
        }

        let key = (db.to_string(), user.name.clone());
        if self.users.contains_key(&key) {
            return Err(AuthError::DuplicateUser(user.name));
        }

        info!("created user {} on {}", user.name, db);
        self.users.insert(key, user);
        self.user_ever_created.store(true, Ordering::Release);
        Ok(())
    }

    /// Removes every user. The localhost exception stays revoked: it is a
    /// bootstrap allowance, not a function of the current user count.
    pub fn drop_all_users(&self) {
        self.users.clear();
    }

    pub fn user_exists(
        &self,
        db: &str,
        name: &str,
    ) -> bool {
        self.users.contains_key(&(db.to_string(), name.to_string()))
    }

    /// Runs the `authenticate` transition. Returns the authenticated
    /// principal on success; the session is left untouched on failure.
    pub fn authenticate(
        &self,
        connection_id: &str,
        db: &str,
        mechanism: AuthMechanism,
        user: Option<&str>,
        pwd: Option<&str>,
    ) -> std::result::Result<String, AuthError> {
        let session = self.session(connection_id)?;

        let principal = match mechanism {
            AuthMechanism::X509 => {
                let subject = session
                    .origin
                    .client_cert_subject
                    .clone()
                    .ok_or(AuthError::NoClientCertificate)?;
                // an explicit user name must match the certificate subject
                if let Some(explicit) = user {
                    if explicit != subject {
                        return Err(AuthError::NoSuchUser(explicit.to_string()));
                    }
                }
                if !self.user_exists(EXTERNAL_AUTH_DB, &subject) {
                    return Err(AuthError::NoSuchUser(subject));
                }
                subject
            }
            AuthMechanism::ScramSha1 => {
                let name = user.ok_or(AuthError::MissingUserName("SCRAM-SHA-1"))?;
                let key = (db.to_string(), name.to_string());
                let stored = self
                    .users
                    .get(&key)
                    .ok_or_else(|| AuthError::NoSuchUser(name.to_string()))?;
                if stored.pwd.as_deref() != pwd {
                    return Err(AuthError::Unauthorized(format!("authentication failed for {}", name)));
                }
                name.to_string()
            }
        };

        if let Some(mut session) = self.sessions.get_mut(connection_id) {
            session.state = AuthState::Authenticated;
            session.principal = Some(principal.clone());
            session.mechanism = Some(mechanism);
        }
        debug!("connection {} authenticated as {}", connection_id, principal);
        Ok(principal)
    }

    /// `Authenticated → LoggedOut`. Logging out a connection that never
    /// authenticated is a no-op.
    pub fn logout(
        &self,
        connection_id: &str,
    ) -> std::result::Result<(), AuthError> {
        let mut session = self
            .sessions
            .get_mut(connection_id)
            .ok_or_else(|| AuthError::UnknownConnection(connection_id.to_string()))?;
        if session.state == AuthState::Authenticated {
            session.state = AuthState::LoggedOut;
            session.principal = None;
        }
        Ok(())
    }
}
