//! Error types for proxy construction.

/// Result type for proxy construction and settings loading.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors that can occur while building a proxy.
///
/// Failures of the wrapped implementation are never reported through this
/// type: they reach the caller of the proxied method unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The contract is not eligible for proxying.
    #[error("invalid contract: {0}")]
    Contract(#[from] ContractError),

    /// A method of the contract cannot be expressed by the dispatch table.
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Settings could not be loaded.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ProxyError {
    /// Returns the contract violation if this is one.
    pub fn contract_error(&self) -> Option<&ContractError> {
        match self {
            ProxyError::Contract(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the synthesis failure if this is one.
    pub fn synthesis_error(&self) -> Option<&SynthesisError> {
        match self {
            ProxyError::Synthesis(e) => Some(e),
            _ => None,
        }
    }

    /// Returns true if the contract itself was rejected before synthesis.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ProxyError::Contract(_))
    }
}

/// Contract eligibility failures, reported before any synthesis work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("no inner instance supplied for contract {contract}")]
    MissingInner { contract: String },

    #[error("contract {contract} is a {kind}, not a trait")]
    NotInterface { contract: String, kind: String },

    #[error("contract {contract} declares properties: {properties:?}")]
    HasProperties {
        contract: String,
        properties: Vec<String>,
    },

    #[error("contract {contract} declares events: {events:?}")]
    HasEvents { contract: String, events: Vec<String> },

    #[error("contract {contract} is an open generic definition over {params:?}")]
    OpenGeneric { contract: String, params: Vec<String> },
}

impl ContractError {
    /// Name of the rejected contract.
    pub fn contract(&self) -> &str {
        match self {
            ContractError::MissingInner { contract }
            | ContractError::NotInterface { contract, .. }
            | ContractError::HasProperties { contract, .. }
            | ContractError::HasEvents { contract, .. }
            | ContractError::OpenGeneric { contract, .. } => contract,
        }
    }
}

/// Failures while building the dispatch table for a contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("{contract}::{method}: parameter `{param}` is passed by {mode}, which cannot be proxied")]
    UnsupportedParameter {
        contract: String,
        method: String,
        param: String,
        mode: String,
    },

    #[error("{contract}::{method}: generic methods cannot be proxied")]
    GenericMethod { contract: String, method: String },

    #[error("{contract}: configuration refers to unknown method #{index}")]
    UnknownMethod { contract: String, index: usize },
}
