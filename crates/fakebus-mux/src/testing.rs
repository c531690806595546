//! Test doubles shared by the engine's unit tests.

use std::collections::HashMap;
use std::os::unix::net::UnixStream;

use fakebus_transport::{EndpointProvisioner, ProvisionedEndpoint, Result, TransportError};

/// Provisions endpoints as socket pairs and records what gets removed.
///
/// The engine gets one end of each pair; the test keeps the other end as
/// the endpoint's "client".
pub(crate) struct RecordingProvisioner {
    prefix: String,
    fail_at: Option<usize>,
    clients: HashMap<usize, UnixStream>,
    deprovisioned: Vec<String>,
}

impl RecordingProvisioner {
    pub(crate) fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            fail_at: None,
            clients: HashMap::new(),
            deprovisioned: Vec::new(),
        }
    }

    /// Make `provision(index)` fail.
    pub(crate) fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Take the client end of endpoint `index`.
    pub(crate) fn take_client(&mut self, index: usize) -> UnixStream {
        self.clients
            .remove(&index)
            .expect("endpoint should have been provisioned")
    }

    pub(crate) fn deprovisioned(&self) -> Vec<String> {
        self.deprovisioned.clone()
    }
}

impl EndpointProvisioner for RecordingProvisioner {
    type Channel = UnixStream;

    fn provision(&mut self, index: usize) -> Result<ProvisionedEndpoint<UnixStream>> {
        if self.fail_at == Some(index) {
            return Err(TransportError::Provision {
                index,
                source: std::io::Error::other("simulated provisioning failure"),
            });
        }
        let (engine, client) = UnixStream::pair()?;
        self.clients.insert(index, client);
        Ok(ProvisionedEndpoint {
            index,
            name: format!("{}{}", self.prefix, index),
            channel: engine,
        })
    }

    fn deprovision(&mut self, name: &str) -> Result<()> {
        self.deprovisioned.push(name.to_string());
        Ok(())
    }
}
