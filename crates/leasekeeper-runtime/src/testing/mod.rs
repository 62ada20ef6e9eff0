//! In-memory registry double for exercising supervisors and the manager.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use leasekeeper_core::{
    HeartbeatResult, RegisterResult, RegistryClient, RegistryEndpoint, ServiceInstance,
};

/// Which registry call was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Register,
    Heartbeat,
    Deregister,
}

/// One call observed by the scripted registry.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub instance: String,
    pub endpoint: RegistryEndpoint,
    pub at: Instant,
}

#[derive(Debug)]
struct Script {
    register: VecDeque<RegisterResult>,
    register_fallback: RegisterResult,
    heartbeat: VecDeque<HeartbeatResult>,
    heartbeat_fallback: HeartbeatResult,
    deregister_ok: bool,
    unreachable: HashSet<RegistryEndpoint>,
    register_status_for: HashMap<String, u16>,
    calls: Vec<RecordedCall>,
}

/// Registry client answering from scripted responses.
///
/// Queued responses are consumed first, then the fallback repeats. Calls to
/// an endpoint marked unreachable fail at the transport level.
#[derive(Debug)]
pub struct ScriptedRegistry {
    script: Mutex<Script>,
    latency: Option<Duration>,
}

impl Default for ScriptedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRegistry {
    /// A registry accepting every call.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                register: VecDeque::new(),
                register_fallback: RegisterResult::from_status(204),
                heartbeat: VecDeque::new(),
                heartbeat_fallback: HeartbeatResult::from_status(200),
                deregister_ok: true,
                unreachable: HashSet::new(),
                register_status_for: HashMap::new(),
                calls: Vec::new(),
            }),
            latency: None,
        }
    }

    pub fn with_register_responses(self, responses: impl IntoIterator<Item = RegisterResult>) -> Self {
        self.script.lock().register.extend(responses);
        self
    }

    pub fn with_register_fallback(self, result: RegisterResult) -> Self {
        self.script.lock().register_fallback = result;
        self
    }

    pub fn with_heartbeat_responses(
        self,
        responses: impl IntoIterator<Item = HeartbeatResult>,
    ) -> Self {
        self.script.lock().heartbeat.extend(responses);
        self
    }

    pub fn with_heartbeat_fallback(self, result: HeartbeatResult) -> Self {
        self.script.lock().heartbeat_fallback = result;
        self
    }

    pub fn with_deregister_ok(self, ok: bool) -> Self {
        self.script.lock().deregister_ok = ok;
        self
    }

    /// Every call to `endpoint` fails with a connection error.
    pub fn with_unreachable(self, endpoint: RegistryEndpoint) -> Self {
        self.script.lock().unreachable.insert(endpoint);
        self
    }

    /// Answer every register call for `name` with `status`.
    pub fn with_register_status_for(self, name: &str, status: u16) -> Self {
        self.script
            .lock()
            .register_status_for
            .insert(name.to_uppercase(), status);
        self
    }

    /// Delay every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().calls.clone()
    }

    pub fn register_calls(&self) -> usize {
        self.count(|c| c.kind == CallKind::Register)
    }

    pub fn heartbeat_calls(&self) -> usize {
        self.count(|c| c.kind == CallKind::Heartbeat)
    }

    pub fn deregister_calls(&self) -> usize {
        self.count(|c| c.kind == CallKind::Deregister)
    }

    pub fn calls_to(&self, endpoint: &RegistryEndpoint) -> usize {
        self.count(|c| &c.endpoint == endpoint)
    }

    pub fn calls_for(&self, instance: &str, kind: CallKind) -> usize {
        self.count(|c| c.instance == instance && c.kind == kind)
    }

    fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Record the call; `false` when the endpoint is unreachable.
    async fn record(
        &self,
        kind: CallKind,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> bool {
        let reachable = {
            let mut script = self.script.lock();
            script.calls.push(RecordedCall {
                kind,
                instance: instance.name().to_string(),
                endpoint: endpoint.clone(),
                at: Instant::now(),
            });
            !script.unreachable.contains(endpoint)
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        reachable
    }
}

#[async_trait]
impl RegistryClient for ScriptedRegistry {
    async fn register(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> RegisterResult {
        if !self.record(CallKind::Register, instance, endpoint).await {
            return RegisterResult::transport_failure("connection refused");
        }

        let mut script = self.script.lock();
        if let Some(status) = script.register_status_for.get(instance.name()) {
            return RegisterResult::from_status(*status);
        }
        script
            .register
            .pop_front()
            .unwrap_or_else(|| script.register_fallback.clone())
    }

    async fn heartbeat(
        &self,
        instance: &ServiceInstance,
        endpoint: &RegistryEndpoint,
    ) -> HeartbeatResult {
        if !self.record(CallKind::Heartbeat, instance, endpoint).await {
            return HeartbeatResult::transport_failure("connection refused");
        }

        let mut script = self.script.lock();
        script
            .heartbeat
            .pop_front()
            .unwrap_or_else(|| script.heartbeat_fallback.clone())
    }

    async fn deregister(&self, instance: &ServiceInstance, endpoint: &RegistryEndpoint) -> bool {
        if !self.record(CallKind::Deregister, instance, endpoint).await {
            return false;
        }
        self.script.lock().deregister_ok
    }
}
