//! In-memory device twin hub
//!
//! Twins are keyed by the `DeviceId` of the connection string used to open
//! them. The hub plays both sides: devices open [`ITwinSession`]s through
//! [`ITwinService`], while service-side code (rule handlers, tests) reaches the
//! same twins through [`IDeviceRegistry`].
//!
//! Callbacks are cloned out of the state lock before they are awaited.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use tokio::sync::Notify;
use tracing::debug;

use twinbridge_core::domain::DeviceConnectionString;
use twinbridge_core::ports::{
    EventMessage, IDesiredPropertyHandler, IDeviceRegistry, IMethodHandler, ITwinService,
    ITwinSession, MethodRequest, MethodResponse, PropertySet,
};

#[derive(Default)]
struct TwinState {
    desired: PropertySet,
    reported: PropertySet,
    reported_updates: Vec<PropertySet>,
    events: Vec<EventMessage>,
    desired_handler: Option<Arc<dyn IDesiredPropertyHandler>>,
    method_handlers: BTreeMap<String, Arc<dyn IMethodHandler>>,
    default_handler: Option<Arc<dyn IMethodHandler>>,
    fail_reported_updates: bool,
    fail_events: bool,
    held_update: Option<Arc<Notify>>,
}

#[derive(Default)]
struct Twin {
    state: Mutex<TwinState>,
}

impl Twin {
    fn lock(&self) -> MutexGuard<'_, TwinState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Default)]
struct HubState {
    twins: HashMap<String, Arc<Twin>>,
    failing_opens: HashSet<String>,
}

/// A reported-property push parked by [`InMemoryTwinHub::hold_next_reported_update`]
pub struct ReportedUpdateHold {
    gate: Arc<Notify>,
}

impl ReportedUpdateHold {
    /// Lets the parked push proceed; releasing before it arrives is remembered
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

/// In-memory twin hub
#[derive(Clone, Default)]
pub struct InMemoryTwinHub {
    inner: Arc<Mutex<HubState>>,
}

impl InMemoryTwinHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The twin of `device_id`, created on first use
    fn twin(&self, device_id: &str) -> Arc<Twin> {
        self.lock()
            .twins
            .entry(device_id.to_string())
            .or_default()
            .clone()
    }

    fn existing(&self, device_id: &str) -> Option<Arc<Twin>> {
        self.lock().twins.get(device_id).cloned()
    }

    fn read<T>(&self, device_id: &str, f: impl FnOnce(&TwinState) -> T) -> Option<T> {
        self.existing(device_id).map(|twin| {
            let state = twin.lock();
            f(&state)
        })
    }

    // --- seeding ---

    /// Sets a desired property without notifying the device
    pub fn seed_desired(&self, device_id: &str, name: &str, value: i64) {
        self.twin(device_id)
            .lock()
            .desired
            .insert(name.to_string(), value);
    }

    /// Sets a reported property as if a previous run had reported it
    pub fn seed_reported(&self, device_id: &str, name: &str, value: i64) {
        self.twin(device_id)
            .lock()
            .reported
            .insert(name.to_string(), value);
    }

    // --- failure injection ---

    /// Makes opening the twin of `device_id` fail
    pub fn fail_open(&self, device_id: &str, fail: bool) {
        let mut state = self.lock();
        if fail {
            state.failing_opens.insert(device_id.to_string());
        } else {
            state.failing_opens.remove(device_id);
        }
    }

    /// Makes reported-property pushes of `device_id` fail
    pub fn fail_reported_updates(&self, device_id: &str, fail: bool) {
        self.twin(device_id).lock().fail_reported_updates = fail;
    }

    /// Parks the next reported-property push of `device_id` until the returned
    /// hold is released
    pub fn hold_next_reported_update(&self, device_id: &str) -> ReportedUpdateHold {
        let gate = Arc::new(Notify::new());
        self.twin(device_id).lock().held_update = Some(gate.clone());
        ReportedUpdateHold { gate }
    }

    /// Makes event publishing of `device_id` fail
    pub fn fail_events(&self, device_id: &str, fail: bool) {
        self.twin(device_id).lock().fail_events = fail;
    }

    // --- inspection ---

    /// Ids of every twin known to the hub, sorted
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.lock().twins.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn desired(&self, device_id: &str) -> PropertySet {
        self.read(device_id, |t| t.desired.clone()).unwrap_or_default()
    }

    pub fn reported(&self, device_id: &str) -> PropertySet {
        self.read(device_id, |t| t.reported.clone()).unwrap_or_default()
    }

    /// Every successful reported-property patch, oldest first
    pub fn reported_updates(&self, device_id: &str) -> Vec<PropertySet> {
        self.read(device_id, |t| t.reported_updates.clone())
            .unwrap_or_default()
    }

    /// Every published event, oldest first
    pub fn events(&self, device_id: &str) -> Vec<EventMessage> {
        self.read(device_id, |t| t.events.clone()).unwrap_or_default()
    }

    /// Names of the methods with a dedicated handler, sorted
    pub fn registered_methods(&self, device_id: &str) -> Vec<String> {
        self.read(device_id, |t| t.method_handlers.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_default_handler(&self, device_id: &str) -> bool {
        self.read(device_id, |t| t.default_handler.is_some())
            .unwrap_or(false)
    }
}

#[async_trait::async_trait]
impl ITwinService for InMemoryTwinHub {
    async fn open(
        &self,
        connection: &DeviceConnectionString,
    ) -> anyhow::Result<Arc<dyn ITwinSession>> {
        let device_id = connection.device_id();
        if self.lock().failing_opens.contains(device_id) {
            bail!("twin hub refused connection for {device_id}");
        }
        debug!(device_id, "In-memory twin opened");
        Ok(Arc::new(HubSession {
            twin: self.twin(device_id),
        }))
    }
}

#[async_trait::async_trait]
impl IDeviceRegistry for InMemoryTwinHub {
    async fn get_desired_properties(
        &self,
        device_id: &str,
    ) -> anyhow::Result<Option<PropertySet>> {
        Ok(self.read(device_id, |t| t.desired.clone()))
    }

    async fn update_desired_property(
        &self,
        device_id: &str,
        name: &str,
        value: i64,
    ) -> anyhow::Result<()> {
        let twin = self
            .existing(device_id)
            .ok_or_else(|| anyhow!("device {device_id} not found"))?;
        let handler = {
            let mut state = twin.lock();
            state.desired.insert(name.to_string(), value);
            state.desired_handler.clone()
        };

        if let Some(handler) = handler {
            let patch = PropertySet::from([(name.to_string(), value)]);
            handler.on_desired_properties(patch).await;
        }
        Ok(())
    }

    async fn invoke_method(&self, device_id: &str, method: &str) -> anyhow::Result<MethodResponse> {
        let twin = self
            .existing(device_id)
            .ok_or_else(|| anyhow!("device {device_id} not found"))?;
        let handler = {
            let state = twin.lock();
            state
                .method_handlers
                .get(method)
                .or(state.default_handler.as_ref())
                .cloned()
        };

        match handler {
            Some(handler) => Ok(handler.handle(MethodRequest::new(method)).await),
            None => bail!("device {device_id} is not listening for methods"),
        }
    }
}

/// A device-side session on one in-memory twin
struct HubSession {
    twin: Arc<Twin>,
}

#[async_trait::async_trait]
impl ITwinSession for HubSession {
    async fn get_reported_properties(&self) -> anyhow::Result<PropertySet> {
        Ok(self.twin.lock().reported.clone())
    }

    async fn get_desired_properties(&self) -> anyhow::Result<PropertySet> {
        Ok(self.twin.lock().desired.clone())
    }

    async fn update_reported_properties(&self, patch: &PropertySet) -> anyhow::Result<()> {
        let held = self.twin.lock().held_update.take();
        if let Some(gate) = held {
            debug!("Reported update parked");
            gate.notified().await;
        }

        let mut state = self.twin.lock();
        if state.fail_reported_updates {
            bail!("reported property update rejected");
        }
        state
            .reported
            .extend(patch.iter().map(|(k, v)| (k.clone(), *v)));
        state.reported_updates.push(patch.clone());
        Ok(())
    }

    async fn on_desired_property_changed(
        &self,
        handler: Arc<dyn IDesiredPropertyHandler>,
    ) -> anyhow::Result<()> {
        self.twin.lock().desired_handler = Some(handler);
        Ok(())
    }

    async fn register_method_handler(
        &self,
        name: &str,
        handler: Arc<dyn IMethodHandler>,
    ) -> anyhow::Result<()> {
        self.twin
            .lock()
            .method_handlers
            .insert(name.to_string(), handler);
        Ok(())
    }

    async fn register_default_method_handler(
        &self,
        handler: Arc<dyn IMethodHandler>,
    ) -> anyhow::Result<()> {
        self.twin.lock().default_handler = Some(handler);
        Ok(())
    }

    async fn send_event(&self, event: &EventMessage) -> anyhow::Result<()> {
        let mut state = self.twin.lock();
        if state.fail_events {
            bail!("event publishing rejected");
        }
        state.events.push(event.clone());
        Ok(())
    }
}
