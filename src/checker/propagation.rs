use tracing::debug;

use crate::metrics::PROPAGATION_POLL_TOTAL;
use crate::utils::retry_until;
use crate::utils::RetryError;
use crate::CheckError;
use crate::ClusterTopology;
use crate::PollPolicy;
use crate::Result;

/// Polls the chunk-holding shards of a namespace until they all report the
/// same index signature.
///
/// The poll fails fast: a shard primary that stops mid-poll aborts the wait
/// with [`CheckError::NodeStoppedDuringPoll`] instead of burning the full
/// timeout on a node that can never answer again.
pub struct IndexPropagationChecker {
    policy: PollPolicy,
}

impl IndexPropagationChecker {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub async fn await_index_convergence(
        &self,
        topology: &ClusterTopology,
        namespace: &str,
    ) -> Result<()> {
        let result = retry_until(
            || async move { self.poll_once(topology, namespace) },
            self.policy.interval(),
            self.policy.timeout(),
        )
        .await;

        match result {
            Ok(()) => {
                PROPAGATION_POLL_TOTAL.with_label_values(&["converged"]).inc();
                Ok(())
            }
            Err(RetryError::Exhausted { waited }) => {
                PROPAGATION_POLL_TOTAL.with_label_values(&["timeout"]).inc();
                Err(CheckError::PropagationTimeout {
                    namespace: namespace.to_string(),
                    waited,
                }
                .into())
            }
            Err(RetryError::Aborted(e)) => {
                PROPAGATION_POLL_TOTAL.with_label_values(&["aborted"]).inc();
                Err(e)
            }
        }
    }

    /// One convergence probe. `Ok(true)` when every chunk-holding shard
    /// reports the same index signature; an unsharded namespace is trivially
    /// converged.
    fn poll_once(
        &self,
        topology: &ClusterTopology,
        namespace: &str,
    ) -> Result<bool> {
        let Some(route) = topology.catalog().collection(namespace) else {
            return Ok(true);
        };

        let mut reference: Option<Vec<(String, bool)>> = None;
        for shard_name in route.chunk_holding_shards() {
            let shard = topology.shard(&shard_name)?;
            let primary = shard.primary();
            if primary.is_stopped() {
                return Err(CheckError::NodeStoppedDuringPoll {
                    node_id: primary.id,
                    namespace: namespace.to_string(),
                }
                .into());
            }

            let signature = shard.store().index_signature(namespace);
            match &reference {
                None => reference = Some(signature),
                Some(expected) if *expected == signature => {}
                Some(_) => {
                    debug!("index signatures of {} diverge at {}", namespace, shard_name);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
