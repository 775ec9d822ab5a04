//! Chain error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Network-level failure talking to the RPC endpoint.
    #[error("chain transport error: {0}")]
    Transport(String),

    /// The RPC endpoint answered with a structured error.
    #[error("chain rpc error: {0}")]
    Rpc(String),

    /// Bad wallet key, unsupported rate mode, or similar setup problems.
    #[error("chain configuration error: {0}")]
    Config(String),
}
