// -
// Reserved namespaces

/// Collection name prefixes that may never be sharded
pub(crate) const SYSTEM_COLLECTION_PREFIX: &str = "system.";

/// Reserved database names (cluster metadata lives here)
pub(crate) const RESERVED_DATABASES: [&str; 3] = ["admin", "config", "local"];

/// Virtual database holding externally authenticated principals
pub(crate) const EXTERNAL_AUTH_DB: &str = "$external";

// -
// Dispatcher defaults

/// Authentication mechanisms advertised by `getParameter`
pub(crate) const AUTHENTICATION_MECHANISMS: &str = "MONGODB-X509,SCRAM-SHA-1";

/// Name of the in-memory server log exposed by `getLog`
pub(crate) const GLOBAL_LOG: &str = "global";

/// Upper bound on buffered `getLog` lines per node
pub(crate) const GLOBAL_LOG_CAPACITY: usize = 1024;

// -
// Supervisor defaults

/// Graceful shutdown bound before escalating to forced termination
pub(crate) const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 3_000;

/// How many candidate ports to probe before declaring startup failure
pub(crate) const PORT_PROBE_ATTEMPTS: usize = 16;
