//! Top-level error type returned by [`crate::engine::Engine::auto_discover`].

use crate::interface::BindError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Interface(#[from] BindError),

    #[error("no usable interface found among {0:?}")]
    NoUsableInterface(Vec<String>),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
