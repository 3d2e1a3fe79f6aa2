//! # Error Definitions
//!
//! Everything a caller of the bridge can observe going wrong.

use crate::channel::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `bind` was called with a name that is currently registered.
    NameAlreadyBound(String),
    /// The proxy was closed locally, or the peer no longer knows the name.
    ServiceClosed(String),
    /// The peer's implementation failed; carries the peer's description.
    Remote(String),
    /// The service exists but exposes no member with this signature.
    ///
    /// Raised on the calling side when the peer reports the mismatch.
    SignatureMismatch { service: String, signature: String },
    /// Channel-level fault. Generally fatal to the connection.
    Transport(TransportError),
    /// A payload could not be encoded or decoded.
    Codec(String),
    /// The declared interface could not be canonicalized.
    Signature(neosig::Error),
    /// The endpoint already has an outbound channel.
    AlreadyConnected,
    /// The endpoint has not been paired with a peer yet.
    NotConnected,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameAlreadyBound(name) => write!(f, "Service '{}' is already bound", name),
            Self::ServiceClosed(name) => write!(f, "Service '{}' is closed", name),
            Self::Remote(msg) => write!(f, "Remote failure: {}", msg),
            Self::SignatureMismatch { service, signature } => {
                write!(f, "Service '{}' has no member '{}'", service, signature)
            }
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(msg) => write!(f, "Codec error: {}", msg),
            Self::Signature(e) => write!(f, "Signature error: {}", e),
            Self::AlreadyConnected => write!(f, "Endpoint is already connected"),
            Self::NotConnected => write!(f, "Endpoint is not connected"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Signature(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

impl From<neosig::Error> for Error {
    fn from(e: neosig::Error) -> Self {
        Self::Signature(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
