use std::collections::BTreeSet;
use std::sync::Arc;

use autometrics::autometrics;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::CommandBody;
use super::CommandRequest;
use super::CommandResponse;
use super::CommandTarget;
use super::FlushScope;
use super::ResponseBody;
use super::RouterCache;
use super::TimingMetadata;
use super::WriteConcern;
use crate::auth::AccessRequest;
use crate::auth::Authenticator;
use crate::auth::ConnectionOrigin;
use crate::auth::UserSpec;
use crate::checker::validate_shardable;
use crate::constants::AUTHENTICATION_MECHANISMS;
use crate::constants::GLOBAL_LOG;
use crate::constants::RESERVED_DATABASES;
use crate::metrics::COMMAND_DISPATCH_TOTAL;
use crate::metrics::COMMAND_DURATION_METRIC;
use crate::store::split_namespace;
use crate::store::CollectionState;
use crate::store::Document;
use crate::store::FieldValue;
use crate::store::IndexSpec;
use crate::ClusterTopology;
use crate::NodeHandle;
use crate::NodeRole;
use crate::Result;
use crate::SupervisorError;

/// Command-level verdict: the payload on success, the rejection reason on
/// failure. Rejections become `ok:false` responses, never harness errors.
type Verdict = std::result::Result<ResponseBody, String>;

/// Routes commands to their target node and executes them against the
/// simulated data plane.
///
/// The dispatcher owns one [`RouterCache`] per router instance and the
/// cluster-wide [`Authenticator`]. Every dispatched command advances the
/// logical clock and stamps the response with timing metadata, so a failed
/// command still gossips cluster time.
pub struct Dispatcher {
    topology: Arc<ClusterTopology>,
    auth: Arc<Authenticator>,
    router_caches: DashMap<u32, Arc<RouterCache>>,
}

impl Dispatcher {
    pub fn new(
        topology: Arc<ClusterTopology>,
        auth: Arc<Authenticator>,
    ) -> Self {
        Self {
            topology,
            auth,
            router_caches: DashMap::new(),
        }
    }

    pub fn topology(&self) -> &Arc<ClusterTopology> {
        &self.topology
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.auth
    }

    /// Opens a client connection, returning its id. Commands are always run
    /// on behalf of a connection so the authentication state machine has a
    /// session to consult.
    pub fn connect(
        &self,
        origin: ConnectionOrigin,
    ) -> String {
        self.auth.open_session(origin)
    }

    pub fn disconnect(
        &self,
        connection_id: &str,
    ) {
        self.auth.close_session(connection_id);
    }

    /// Dispatches one command.
    ///
    /// Returns `Err` only for harness-level failures (unknown target,
    /// stopped node, unknown connection); everything the simulated server
    /// would answer itself comes back as a [`CommandResponse`], rejected
    /// ones included.
    #[autometrics(objective = crate::API_SLO)]
    pub async fn run(
        &self,
        connection_id: &str,
        request: CommandRequest,
    ) -> Result<CommandResponse> {
        let node = self.resolve_target(&request.target)?;
        if !node.is_ready() {
            return Err(SupervisorError::NodeStopped(node.id).into());
        }
        self.auth.session(connection_id)?;

        if let Some(gossiped) = request.cluster_time {
            self.topology.clock().observe(gossiped);
        }

        let command = request.body.name().to_string();
        let timer = COMMAND_DURATION_METRIC.with_label_values(&[command.as_str()]).start_timer();

        let verdict = match self.gate(connection_id, &request.body) {
            Err(reason) => Err(reason),
            Ok(()) => self.execute(&node, connection_id, &request.body)?,
        };

        let (ok, errmsg, body) = match verdict {
            Ok(body) => (true, None, body),
            Err(reason) => {
                warn!("{} rejected on node {}: {}", command, node.id, reason);
                (false, Some(reason), ResponseBody::None)
            }
        };

        // operation time first, cluster time second; the tick in between is
        // what keeps operation_time <= cluster_time inside one response
        let operation_time = self.topology.clock().now();
        let cluster_time = self.topology.clock().tick();

        timer.observe_duration();
        COMMAND_DISPATCH_TOTAL
            .with_label_values(&[command.as_str(), if ok { "true" } else { "false" }])
            .inc();
        debug!("{} on node {} -> ok={}", command, node.id, ok);

        Ok(CommandResponse {
            ok,
            errmsg,
            body,
            timing: TimingMetadata {
                cluster_time,
                operation_time,
            },
        })
    }

    fn resolve_target(
        &self,
        target: &CommandTarget,
    ) -> Result<Arc<NodeHandle>> {
        match target {
            CommandTarget::Router(index) => Ok(self.topology.router(*index)?.clone()),
            CommandTarget::Shard(name) => Ok(self.topology.shard(name)?.primary().clone()),
            CommandTarget::Replica { shard, member } => Ok(self.topology.replica(shard, *member)?.clone()),
            CommandTarget::ConfigServer => Ok(self.topology.config_server().clone()),
        }
    }

    /// Authorization gate. `createUser` is reachable through the localhost
    /// exception; reads and writes require full authentication.
    fn gate(
        &self,
        connection_id: &str,
        body: &CommandBody,
    ) -> std::result::Result<(), String> {
        let access = match body {
            CommandBody::Ping | CommandBody::Authenticate { .. } | CommandBody::Logout => return Ok(()),
            CommandBody::CreateUser { .. } => AccessRequest::UserAdmin,
            _ => AccessRequest::Operate,
        };
        self.auth.authorize(connection_id, access).map_err(|e| e.to_string())
    }

    fn execute(
        &self,
        node: &Arc<NodeHandle>,
        connection_id: &str,
        body: &CommandBody,
    ) -> Result<Verdict> {
        let via_router = node.role == NodeRole::Router;

        match body {
            CommandBody::EnableSharding { db } => {
                if !via_router {
                    return Ok(Err(router_only("enableSharding")));
                }
                self.enable_sharding(db)
            }
            CommandBody::ShardCollection {
                namespace,
                key,
                unique,
            } => {
                if !via_router {
                    return Ok(Err(router_only("shardCollection")));
                }
                self.shard_collection(namespace, key, *unique)
            }
            CommandBody::Split { namespace, middle } => {
                if !via_router {
                    return Ok(Err(router_only("split")));
                }
                Ok(self
                    .topology
                    .catalog()
                    .split(namespace, middle)
                    .map(|()| ResponseBody::None))
            }
            CommandBody::MoveChunk { namespace, find, to } => {
                if !via_router {
                    return Ok(Err(router_only("moveChunk")));
                }
                self.move_chunk(namespace, find, to)
            }
            CommandBody::FlushRouterConfig { selector } => {
                if !via_router {
                    return Ok(Err(router_only("flushRouterConfig")));
                }
                let scope = FlushScope::from_selector(selector);
                self.cache_for(node.id).invalidate(&scope);
                info!("router {} flushed its routing table ({:?})", node.id, scope);
                Ok(Ok(ResponseBody::None))
            }
            CommandBody::GetParameter { name } => Ok(self.get_parameter(name)),
            CommandBody::ReplSetGetStatus => Ok(repl_set_get_status(node)),
            CommandBody::GetLog { name } => Ok(get_log(node, name)),
            CommandBody::CreateUser { db, user } => Ok(self.create_user(db, user)),
            CommandBody::Authenticate {
                db,
                mechanism,
                user,
                pwd,
            } => self.authenticate(node, connection_id, db, *mechanism, user.as_deref(), pwd.as_deref()),
            CommandBody::Logout => Ok(self.auth.logout(connection_id).map(|()| ResponseBody::None).map_err(|e| e.to_string())),
            CommandBody::Eval { namespace, .. } => Ok(self.eval(namespace, via_router)),
            CommandBody::Group { namespace } => self.group(node, via_router, namespace),
            CommandBody::Insert {
                namespace,
                documents,
                write_concern,
            } => self.insert(node, via_router, namespace, documents, write_concern.as_ref()),
            CommandBody::CreateIndex { namespace, index } => self.create_index(node, via_router, namespace, index),
            CommandBody::DropIndex {
                namespace,
                index_name,
            } => self.drop_index(node, via_router, namespace, index_name),
            CommandBody::CreateCollection {
                namespace, capped, ..
            } => self.create_collection(node, via_router, namespace, *capped),
            CommandBody::ConvertToCapped { namespace, .. } => self.convert_to_capped(node, via_router, namespace),
            CommandBody::Count { namespace } => self.count(node, via_router, namespace),
            CommandBody::Find { namespace } => self.find(node, via_router, namespace),
            CommandBody::ListDatabases => Ok(Ok(self.list_databases(node, via_router))),
            CommandBody::Ping => Ok(Ok(ResponseBody::None)),
            CommandBody::Unknown { name } => Ok(Err(format!("no such command: '{}'", name))),
        }
    }

    fn cache_for(
        &self,
        router_id: u32,
    ) -> Arc<RouterCache> {
        self.router_caches
            .entry(router_id)
            .or_insert_with(|| Arc::new(RouterCache::new()))
            .clone()
    }

    fn enable_sharding(
        &self,
        db: &str,
    ) -> Result<Verdict> {
        if RESERVED_DATABASES.contains(&db) {
            return Ok(Err(format!("cannot enable sharding on the {} database", db)));
        }
        let primary = self.topology.enable_sharding_for_database(db, None)?;
        info!("sharding enabled for {} with primary {}", db, primary);
        Ok(Ok(ResponseBody::None))
    }

    fn shard_collection(
        &self,
        namespace: &str,
        key: &str,
        unique: bool,
    ) -> Result<Verdict> {
        let catalog = self.topology.catalog();
        let (db, _) = split_namespace(namespace);

        if !catalog.sharding_enabled(db) {
            return Ok(Err(format!("sharding not enabled for database {}", db)));
        }
        if catalog.is_sharded(namespace) {
            return Ok(Err(format!("{} is already sharded", namespace)));
        }

        let primary = self.topology.primary_shard_for(db)?;
        if let Err(violation) = validate_shardable(primary.store(), namespace, key) {
            return Ok(Err(violation.to_string()));
        }

        // the shard-key index doubles as the uniqueness anchor when asked for
        primary
            .store()
            .with_collection(namespace, |c| c.ensure_index(IndexSpec::new([key], unique)));
        catalog.shard_collection(namespace, key, unique, &primary.name);
        primary.primary().set_last_applied(self.topology.clock().tick());

        info!("{} sharded on key {} (unique: {})", namespace, key, unique);
        Ok(Ok(ResponseBody::None))
    }

    fn move_chunk(
        &self,
        namespace: &str,
        find: &FieldValue,
        to: &str,
    ) -> Result<Verdict> {
        if self.topology.shard(to).is_err() {
            return Ok(Err(format!("unknown destination shard {}", to)));
        }

        let catalog = self.topology.catalog();
        let moved = match catalog.move_chunk(namespace, find, to) {
            Ok(chunk) => chunk,
            Err(reason) => return Ok(Err(reason)),
        };
        let Some(route) = catalog.collection(namespace) else {
            return Ok(Err(format!("{} is not sharded", namespace)));
        };

        let source = self.topology.shard(&moved.shard)?;
        let destination = self.topology.shard(to)?;

        let indexes = source
            .store()
            .read_collection(namespace, |c| c.indexes.clone())
            .unwrap_or_default();
        destination.store().adopt_indexes(namespace, &indexes);

        let documents = source
            .store()
            .extract_documents(namespace, &route.shard_key, |value| moved.contains(value));
        let migrated = documents.len();
        for document in documents {
            destination.store().insert_document(namespace, document);
        }

        let time = self.topology.clock().tick();
        source.primary().set_last_applied(time);
        destination.primary().set_last_applied(time);

        info!(
            "moved chunk of {} from {} to {} ({} document(s))",
            namespace, moved.shard, to, migrated
        );
        Ok(Ok(ResponseBody::None))
    }

    fn get_parameter(
        &self,
        name: &str,
    ) -> Verdict {
        if name == "authenticationMechanisms" {
            return Ok(ResponseBody::Parameter {
                name: name.to_string(),
                value: AUTHENTICATION_MECHANISMS.to_string(),
            });
        }
        Err(format!("no option found to get: {}", name))
    }

    fn create_user(
        &self,
        db: &str,
        user: &UserSpec,
    ) -> Verdict {
        self.auth
            .create_user(db, user.clone())
            .map(|()| ResponseBody::None)
            .map_err(|e| e.to_string())
    }

    fn authenticate(
        &self,
        node: &Arc<NodeHandle>,
        connection_id: &str,
        db: &str,
        mechanism: crate::auth::AuthMechanism,
        user: Option<&str>,
        pwd: Option<&str>,
    ) -> Result<Verdict> {
        let session = self.auth.session(connection_id)?;
        match self.auth.authenticate(connection_id, db, mechanism, user, pwd) {
            Ok(principal) => {
                node.append_log(format!(
                    "Successfully authenticated as principal {} on {} from client {}",
                    principal, db, session.origin.client_addr
                ));
                Ok(Ok(ResponseBody::None))
            }
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    fn eval(
        &self,
        namespace: &str,
        via_router: bool,
    ) -> Verdict {
        if via_router && self.topology.catalog().is_sharded(namespace) {
            return Err(format!("eval is not allowed on the sharded collection {}", namespace));
        }
        Ok(ResponseBody::Eval(FieldValue::Null))
    }

    /// `group` runs server-side code like `eval`: fine while the collection
    /// is unsharded, rejected once it is sharded.
    fn group(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
    ) -> Result<Verdict> {
        if via_router && self.topology.catalog().is_sharded(namespace) {
            return Ok(Err(format!(
                "can't do command: group on sharded collection {}",
                namespace
            )));
        }
        self.find(node, via_router, namespace)
    }

    fn insert(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
        documents: &[Document],
        write_concern: Option<&WriteConcern>,
    ) -> Result<Verdict> {
        if let Some(wc) = write_concern {
            if let Some(field) = wc.unknown_fields.keys().next() {
                return Ok(Err(format!("unrecognized write concern field: {}", field)));
            }
        }

        if !via_router {
            for document in documents {
                node.store().insert_document(namespace, document.clone());
            }
            node.set_last_applied(self.topology.clock().tick());
            return Ok(Ok(ResponseBody::None));
        }

        let route = self.cache_for(node.id).resolve(self.topology.catalog(), namespace);
        let Some(route) = route else {
            let (db, _) = split_namespace(namespace);
            let primary = self.topology.primary_shard_for(db)?;
            for document in documents {
                primary.store().insert_document(namespace, document.clone());
            }
            primary.primary().set_last_applied(self.topology.clock().tick());
            return Ok(Ok(ResponseBody::None));
        };

        // The whole batch is validated before any document is applied: a
        // rejected insert leaves every shard's document count unchanged.
        let mut placements = Vec::with_capacity(documents.len());
        let mut batch_keys: BTreeSet<FieldValue> = BTreeSet::new();
        for document in documents {
            let value = CollectionState::field_value(document, &route.shard_key);
            if value.is_null() {
                return Ok(Err(format!(
                    "document is missing a value for shard key field {}",
                    route.shard_key
                )));
            }

            if route.unique {
                if !batch_keys.insert(value.clone()) {
                    return Ok(Err(format!(
                        "E11000 duplicate key error on {}: {} {}",
                        namespace, route.shard_key, value
                    )));
                }
                for shard_name in route.chunk_holding_shards() {
                    let holds = self
                        .topology
                        .shard(&shard_name)?
                        .store()
                        .read_collection(namespace, |c| c.contains_key_value(&route.shard_key, &value))
                        .unwrap_or(false);
                    if holds {
                        return Ok(Err(format!(
                            "E11000 duplicate key error on {}: {} {}",
                            namespace, route.shard_key, value
                        )));
                    }
                }
            }

            let Some(owner) = route.owning_shard(&value) else {
                return Ok(Err(format!("no chunk of {} covers shard-key value {}", namespace, value)));
            };
            placements.push((owner, document));
        }

        for (owner, document) in placements {
            let shard = self.topology.shard(owner)?;
            shard.store().insert_document(namespace, document.clone());
            shard.primary().set_last_applied(self.topology.clock().tick());
        }
        Ok(Ok(ResponseBody::None))
    }

    fn create_index(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
        index: &IndexSpec,
    ) -> Result<Verdict> {
        if !via_router {
            node.store().with_collection(namespace, |c| c.ensure_index(index.clone()));
            node.set_last_applied(self.topology.clock().tick());
            return Ok(Ok(ResponseBody::None));
        }

        let route = self.cache_for(node.id).resolve(self.topology.catalog(), namespace);
        match route {
            Some(route) => {
                if index.unique && !index.prefixed_by(&route.shard_key) {
                    return Ok(Err(format!(
                        "cannot create unique index over {} with shard key pattern {}",
                        index.name(),
                        route.shard_key
                    )));
                }
                for shard_name in route.chunk_holding_shards() {
                    let shard = self.topology.shard(&shard_name)?;
                    shard.store().with_collection(namespace, |c| c.ensure_index(index.clone()));
                    shard.primary().set_last_applied(self.topology.clock().tick());
                }
            }
            None => {
                let (db, _) = split_namespace(namespace);
                let primary = self.topology.primary_shard_for(db)?;
                primary.store().with_collection(namespace, |c| c.ensure_index(index.clone()));
                primary.primary().set_last_applied(self.topology.clock().tick());
            }
        }
        Ok(Ok(ResponseBody::None))
    }

    fn drop_index(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
        index_name: &str,
    ) -> Result<Verdict> {
        if !via_router {
            let dropped = node.store().has_collection(namespace)
                && node.store().with_collection(namespace, |c| c.drop_index(index_name));
            if !dropped {
                return Ok(Err(format!("index not found with name [{}]", index_name)));
            }
            node.set_last_applied(self.topology.clock().tick());
            return Ok(Ok(ResponseBody::None));
        }

        let route = self.cache_for(node.id).resolve(self.topology.catalog(), namespace);
        match route {
            Some(route) => {
                let shard_key_index = IndexSpec::new([route.shard_key.as_str()], route.unique).name();
                if index_name == shard_key_index {
                    return Ok(Err(format!(
                        "cannot drop the shard key index {} of {}",
                        index_name, namespace
                    )));
                }
                let mut dropped = false;
                for shard_name in route.chunk_holding_shards() {
                    let shard = self.topology.shard(&shard_name)?;
                    if shard.store().with_collection(namespace, |c| c.drop_index(index_name)) {
                        dropped = true;
                        shard.primary().set_last_applied(self.topology.clock().tick());
                    }
                }
                if !dropped {
                    return Ok(Err(format!("index not found with name [{}]", index_name)));
                }
            }
            None => {
                let (db, _) = split_namespace(namespace);
                let primary = self.topology.primary_shard_for(db)?;
                if !primary.store().with_collection(namespace, |c| c.drop_index(index_name)) {
                    return Ok(Err(format!("index not found with name [{}]", index_name)));
                }
                primary.primary().set_last_applied(self.topology.clock().tick());
            }
        }
        Ok(Ok(ResponseBody::None))
    }

    fn create_collection(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
        capped: bool,
    ) -> Result<Verdict> {
        let store = if via_router {
            let (db, _) = split_namespace(namespace);
            self.topology.primary_shard_for(db)?.store().clone()
        } else {
            node.store().clone()
        };

        if store.has_collection(namespace) {
            return Ok(Err(format!("collection {} already exists", namespace)));
        }
        store.create_collection(namespace, capped);
        Ok(Ok(ResponseBody::None))
    }

    fn convert_to_capped(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
    ) -> Result<Verdict> {
        if via_router && self.topology.catalog().is_sharded(namespace) {
            return Ok(Err(format!(
                "convertToCapped is not allowed on the sharded collection {}",
                namespace
            )));
        }

        let store = if via_router {
            let (db, _) = split_namespace(namespace);
            self.topology.primary_shard_for(db)?.store().clone()
        } else {
            node.store().clone()
        };

        if !store.has_collection(namespace) {
            return Ok(Err(format!("source collection {} does not exist", namespace)));
        }
        store.with_collection(namespace, |c| c.capped = true);
        Ok(Ok(ResponseBody::None))
    }

    fn count(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
    ) -> Result<Verdict> {
        if !via_router {
            return Ok(Ok(ResponseBody::Count(node.store().count(namespace))));
        }

        let route = self.cache_for(node.id).resolve(self.topology.catalog(), namespace);
        let total = match route {
            Some(route) => {
                let mut total = 0;
                for shard_name in route.chunk_holding_shards() {
                    total += self.topology.shard(&shard_name)?.store().count(namespace);
                }
                total
            }
            None => {
                let (db, _) = split_namespace(namespace);
                self.topology.primary_shard_for(db)?.store().count(namespace)
            }
        };
        Ok(Ok(ResponseBody::Count(total)))
    }

    fn find(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
        namespace: &str,
    ) -> Result<Verdict> {
        if !via_router {
            return Ok(Ok(ResponseBody::Documents(node.store().find_all(namespace))));
        }

        let route = self.cache_for(node.id).resolve(self.topology.catalog(), namespace);
        let documents = match route {
            Some(route) => {
                let mut documents = Vec::new();
                for shard_name in route.chunk_holding_shards() {
                    documents.extend(self.topology.shard(&shard_name)?.store().find_all(namespace));
                }
                documents
            }
            None => {
                let (db, _) = split_namespace(namespace);
                self.topology.primary_shard_for(db)?.store().find_all(namespace)
            }
        };
        Ok(Ok(ResponseBody::Documents(documents)))
    }

    fn list_databases(
        &self,
        node: &Arc<NodeHandle>,
        via_router: bool,
    ) -> ResponseBody {
        if !via_router {
            return ResponseBody::Databases {
                names: node.store().database_names().into_iter().collect(),
                total_size: node.store().approximate_size(),
            };
        }

        let mut names = std::collections::BTreeSet::new();
        let mut total_size = 0;
        for shard in self.topology.shards() {
            names.extend(shard.store().database_names());
            total_size += shard.store().approximate_size();
        }
        ResponseBody::Databases {
            names: names.into_iter().collect(),
            total_size,
        }
    }
}

fn router_only(command: &str) -> String {
    format!("{} can only be sent to a router", command)
}

fn repl_set_get_status(node: &Arc<NodeHandle>) -> Verdict {
    match &node.options.replica_set {
        Some(set) => Ok(ResponseBody::ReplSetStatus {
            set: set.clone(),
            applied_op_time: node.last_applied(),
        }),
        None => Err("not running with --replSet".to_string()),
    }
}

fn get_log(
    node: &Arc<NodeHandle>,
    name: &str,
) -> Verdict {
    if name != GLOBAL_LOG {
        return Err(format!("no log named {}", name));
    }
    Ok(ResponseBody::LogLines(node.log_lines()))
}
