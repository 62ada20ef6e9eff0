use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use leasekeeper_core::{
    FailoverSelector, LeaseState, MetricsStore, RegistryClient, RegistryEndpoint, RetryPolicy,
    ServiceInstance,
};

use crate::lease::{LeaseExit, LeaseStatus, LeaseSupervisor};

/// One supervised lifecycle, failing over across the candidate endpoints.
pub(crate) struct FailoverRun {
    pub instance: ServiceInstance,
    pub endpoints: Vec<RegistryEndpoint>,
    pub client: Arc<dyn RegistryClient>,
    pub metrics: Arc<MetricsStore>,
    pub policy: RetryPolicy,
    pub cancel: CancellationToken,
    pub status: Arc<watch::Sender<LeaseStatus>>,
}

impl FailoverRun {
    pub async fn run(self) -> LeaseExit {
        let mut selector = FailoverSelector::new(self.endpoints.iter().cloned());
        // With a single endpoint there is nothing to fail over to.
        let fail_fast = selector.len() > 1;

        let exit = loop {
            let Ok(endpoint) = selector.pick() else {
                self.status.send_modify(|s| {
                    s.state = LeaseState::Stopped;
                    s.exit = Some(LeaseExit::EndpointsExhausted);
                });
                break LeaseExit::EndpointsExhausted;
            };

            self.status
                .send_modify(|s| s.endpoint = Some(endpoint.clone()));

            let supervisor = LeaseSupervisor::new(
                self.instance.clone(),
                endpoint.clone(),
                self.client.clone(),
                self.metrics.clone(),
                self.policy.clone(),
                self.cancel.clone(),
            )
            .with_status(self.status.clone())
            .with_fail_fast(fail_fast);

            let exit = supervisor
                .run()
                .instrument(tracing::info_span!("endpoint", url = %endpoint))
                .await;

            if exit != LeaseExit::Unreachable {
                break exit;
            }

            selector.mark_tried(&endpoint);
            tracing::warn!(
                endpoint = %endpoint,
                tried = selector.tried_count(),
                candidates = selector.len(),
                "Failing over to another registry endpoint"
            );
        };

        if let Some(err) = exit.into_error(self.instance.name(), &self.policy, selector.len()) {
            tracing::error!(error = %err, "Lease failed");
        }
        exit
    }
}
