use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fakebus_transport::{EndpointProvisioner, ProvisionedEndpoint};
use tracing::{info, warn};

use crate::error::Result;

/// One virtual endpoint: its identity and the multiplexer's channel to it.
#[derive(Debug)]
pub struct Endpoint<C> {
    index: usize,
    name: String,
    channel: C,
}

impl<C> Endpoint<C> {
    pub fn new(index: usize, name: impl Into<String>, channel: C) -> Self {
        Self {
            index,
            name: name.into(),
            channel,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Public name clients open.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (usize, String, C) {
        (self.index, self.name, self.channel)
    }
}

impl<C> From<ProvisionedEndpoint<C>> for Endpoint<C> {
    fn from(endpoint: ProvisionedEndpoint<C>) -> Self {
        Self::new(endpoint.index, endpoint.name, endpoint.channel)
    }
}

/// The endpoints fixed at startup, in fan-out order.
#[derive(Debug)]
pub struct EndpointSet<C> {
    endpoints: Vec<Endpoint<C>>,
}

impl<C> EndpointSet<C> {
    pub fn new(endpoints: Vec<Endpoint<C>>) -> Self {
        Self { endpoints }
    }

    /// Provision `count` endpoints, indexed `0..count`.
    ///
    /// If any endpoint fails, the ones already created are deprovisioned
    /// again before the error is returned.
    pub fn provision<P>(provisioner: &mut P, count: usize) -> Result<Self>
    where
        P: EndpointProvisioner<Channel = C>,
    {
        info!(count, "creating endpoints");
        let mut endpoints = Vec::with_capacity(count);
        for index in 0..count {
            match provisioner.provision(index) {
                Ok(endpoint) => endpoints.push(Endpoint::from(endpoint)),
                Err(err) => {
                    for created in &endpoints {
                        if let Err(cleanup) = provisioner.deprovision(created.name()) {
                            warn!(endpoint = %created.name(), error = %cleanup, "rollback failed");
                        }
                    }
                    return Err(err.into());
                }
            }
        }
        info!("all endpoints created");
        Ok(Self::new(endpoints))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint<C>> {
        self.endpoints.iter()
    }

    /// Public names in fan-out order.
    pub fn names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name.clone()).collect()
    }

    pub(crate) fn into_inner(self) -> Vec<Endpoint<C>> {
        self.endpoints
    }
}

/// Which endpoints are still being served.
///
/// All endpoints start alive. Under [`crate::FailurePolicy::Isolate`] a
/// failed endpoint is marked dead and fan-out skips it from then on.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<[AtomicBool]>,
}

impl Liveness {
    pub fn new(count: usize) -> Self {
        Self {
            alive: (0..count).map(|_| AtomicBool::new(true)).collect(),
        }
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.alive
            .get(index)
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Mark an endpoint dead. Returns `true` if it was alive.
    pub fn mark_dead(&self, index: usize) -> bool {
        self.alive
            .get(index)
            .is_some_and(|flag| flag.swap(false, Ordering::SeqCst))
    }

    pub fn live_count(&self) -> usize {
        self.alive
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }
}
