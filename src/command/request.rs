use std::collections::BTreeMap;

use crate::auth::AuthMechanism;
use crate::auth::UserSpec;
use crate::clock::ClusterTime;
use crate::store::Document;
use crate::store::FieldValue;
use crate::store::IndexSpec;

/// Where a command is sent. Shard and replica targets bypass the router and
/// talk to a member directly, the way scenario code inspects individual
/// shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    Router(usize),
    /// The shard's replica-set primary
    Shard(String),
    Replica {
        shard: String,
        member: usize,
    },
    ConfigServer,
}

/// The `flushRouterConfig` argument: zero args, a boolean, a database name
/// or a `db.collection` string are all valid invalidation-scope selectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushSelector {
    None,
    Flag(bool),
    Scope(String),
}

/// Write concern as attached to a write command. Only `w`, `wtimeout` and
/// `j` are recognized; anything else lands in `unknown_fields` and fails
/// the command.
#[derive(Debug, Clone, Default)]
pub struct WriteConcern {
    pub w: Option<i64>,
    pub wtimeout_ms: Option<u64>,
    pub journal: Option<bool>,
    pub unknown_fields: BTreeMap<String, FieldValue>,
}

impl WriteConcern {
    pub fn acknowledged() -> Self {
        Self {
            w: Some(1),
            ..Default::default()
        }
    }

    pub fn with_unknown_field(
        name: &str,
        value: FieldValue,
    ) -> Self {
        let mut wc = Self::default();
        wc.unknown_fields.insert(name.to_string(), value);
        wc
    }
}

/// Whether `eval` arrived in the legacy shell form or as a structured
/// command. Both forms carry identical semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalForm {
    Legacy,
    Structured,
}

/// The administrative and CRUD command set, one schema per command.
#[derive(Debug, Clone)]
pub enum CommandBody {
    EnableSharding {
        db: String,
    },
    ShardCollection {
        namespace: String,
        key: String,
        unique: bool,
    },
    Split {
        namespace: String,
        middle: FieldValue,
    },
    MoveChunk {
        namespace: String,
        find: FieldValue,
        to: String,
    },
    FlushRouterConfig {
        selector: FlushSelector,
    },
    GetParameter {
        name: String,
    },
    ReplSetGetStatus,
    GetLog {
        name: String,
    },
    CreateUser {
        db: String,
        user: UserSpec,
    },
    Authenticate {
        db: String,
        mechanism: AuthMechanism,
        user: Option<String>,
        pwd: Option<String>,
    },
    Logout,
    Eval {
        namespace: String,
        form: EvalForm,
    },
    Group {
        namespace: String,
    },
    Insert {
        namespace: String,
        documents: Vec<Document>,
        write_concern: Option<WriteConcern>,
    },
    CreateIndex {
        namespace: String,
        index: IndexSpec,
    },
    DropIndex {
        namespace: String,
        index_name: String,
    },
    CreateCollection {
        namespace: String,
        capped: bool,
        size: Option<u64>,
    },
    ConvertToCapped {
        namespace: String,
        size: u64,
    },
    Count {
        namespace: String,
    },
    Find {
        namespace: String,
    },
    ListDatabases,
    Ping,
    Unknown {
        name: String,
    },
}

impl CommandBody {
    /// Command name as it would appear on the wire.
    pub fn name(&self) -> &str {
        match self {
            CommandBody::EnableSharding { .. } => "enableSharding",
            CommandBody::ShardCollection { .. } => "shardCollection",
            CommandBody::Split { .. } => "split",
            CommandBody::MoveChunk { .. } => "moveChunk",
            CommandBody::FlushRouterConfig { .. } => "flushRouterConfig",
            CommandBody::GetParameter { .. } => "getParameter",
            CommandBody::ReplSetGetStatus => "replSetGetStatus",
            CommandBody::GetLog { .. } => "getLog",
            CommandBody::CreateUser { .. } => "createUser",
            CommandBody::Authenticate { .. } => "authenticate",
            CommandBody::Logout => "logout",
            CommandBody::Eval { .. } => "eval",
            CommandBody::Group { .. } => "group",
            CommandBody::Insert { .. } => "insert",
            CommandBody::CreateIndex { .. } => "createIndex",
            CommandBody::DropIndex { .. } => "dropIndex",
            CommandBody::CreateCollection { .. } => "createCollection",
            CommandBody::ConvertToCapped { .. } => "convertToCapped",
            CommandBody::Count { .. } => "count",
            CommandBody::Find { .. } => "find",
            CommandBody::ListDatabases => "listDatabases",
            CommandBody::Ping => "ping",
            CommandBody::Unknown { name } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub body: CommandBody,
    pub target: CommandTarget,
    /// Cluster time gossiped by the client, merged into the cluster clock
    /// before the command runs. Never moves the clock backwards.
    pub cluster_time: Option<ClusterTime>,
}

impl CommandRequest {
    pub fn new(
        body: CommandBody,
        target: CommandTarget,
    ) -> Self {
        Self {
            body,
            target,
            cluster_time: None,
        }
    }

    pub fn with_cluster_time(
        mut self,
        time: ClusterTime,
    ) -> Self {
        self.cluster_time = Some(time);
        self
    }
}

/// Logical-clock metadata attached to every response, success or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingMetadata {
    pub cluster_time: ClusterTime,
    pub operation_time: ClusterTime,
}

/// Command-specific response payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    None,
    Count(u64),
    Documents(Vec<Document>),
    LogLines(Vec<String>),
    Parameter {
        name: String,
        value: String,
    },
    ReplSetStatus {
        set: String,
        applied_op_time: ClusterTime,
    },
    Databases {
        names: Vec<String>,
        total_size: u64,
    },
    Eval(FieldValue),
}

/// Structured command outcome. Failures are responses too, carried as
/// `ok:false` with a reason string rather than harness errors.
#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub ok: bool,
    pub errmsg: Option<String>,
    pub body: ResponseBody,
    pub timing: TimingMetadata,
}

impl CommandResponse {
    pub fn count(&self) -> Option<u64> {
        match &self.body {
            ResponseBody::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn log_lines(&self) -> Option<&[String]> {
        match &self.body {
            ResponseBody::LogLines(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn documents(&self) -> Option<&[Document]> {
        match &self.body {
            ResponseBody::Documents(docs) => Some(docs),
            _ => None,
        }
    }
}
