use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[allow(unused)]
pub struct SecurityConfig {
    /// Enables the per-connection authentication state machine
    /// Default: false (every command is allowed)
    #[serde(default = "default_auth_enabled")]
    pub auth_enabled: bool,

    /// Enables TLS material distribution to nodes
    /// Default: false
    #[serde(default = "default_enable_tls")]
    pub enable_tls: bool,

    /// Server certificate chain path in PEM format
    #[serde(default = "default_server_cert_path")]
    pub server_certificate_path: String,

    /// Path to Certificate Authority root certificate
    #[serde(default = "default_ca_path")]
    pub certificate_authority_root_path: String,

    /// Shared internal-cluster key file for inter-node authentication
    #[serde(default)]
    pub cluster_key_file: Option<String>,

    /// X.509 subject of the server certificate. Subjects that match it, or
    /// that differ from it only in CN, are reserved for cluster membership
    /// and may never be created as users.
    #[serde(default = "default_server_subject")]
    pub server_x509_subject: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            auth_enabled: default_auth_enabled(),
            enable_tls: default_enable_tls(),
            server_certificate_path: default_server_cert_path(),
            certificate_authority_root_path: default_ca_path(),
            cluster_key_file: None,
            server_x509_subject: default_server_subject(),
        }
    }
}

// Default implementations
fn default_auth_enabled() -> bool {
    false
}
fn default_enable_tls() -> bool {
    false
}
fn default_server_cert_path() -> String {
    "./certs/server.pem".into()
}
fn default_ca_path() -> String {
    "/etc/ssl/certs/ca.pem".into()
}
fn default_server_subject() -> String {
    "C=US,ST=New York,L=New York City,O=ShardKit,OU=Kernel,CN=server".into()
}
