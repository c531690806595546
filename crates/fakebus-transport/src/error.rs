use std::path::PathBuf;

/// Errors that can occur while opening, configuring or provisioning channels.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open a device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to apply terminal settings to a device.
    #[error("failed to configure {path}: {source}")]
    Configure {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The requested baud rate has no termios equivalent on this platform.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// Failed to allocate a pseudo-terminal for an endpoint.
    #[error("failed to provision endpoint {index}: {source}")]
    Provision {
        index: usize,
        source: std::io::Error,
    },

    /// Failed to create or remove an endpoint's public name.
    #[error("failed to link {path}: {source}")]
    Link {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The endpoint name is not owned by this provisioner.
    #[error("endpoint {0} is not provisioned")]
    NotProvisioned(String),

    /// An I/O error occurred on a channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
