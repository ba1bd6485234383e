//! Eligibility checks run on every build, before synthesis.

use crate::error::ContractError;

use super::{ContractDescriptor, ContractKind};

/// Check that a contract can be proxied.
pub fn validate(contract: &ContractDescriptor) -> Result<(), ContractError> {
    require_interface(contract)?;
    require_no_properties(contract)?;
    require_no_events(contract)?;
    require_closed(contract)?;
    Ok(())
}

/// Check a build request: the inner instance first, then the contract.
///
/// Hands the inner instance back once everything passes.
pub fn validate_build<T>(
    contract: &ContractDescriptor,
    inner: Option<T>,
) -> Result<T, ContractError> {
    let inner = inner.ok_or_else(|| ContractError::MissingInner {
        contract: contract.name.to_string(),
    })?;
    validate(contract)?;
    Ok(inner)
}

fn require_interface(contract: &ContractDescriptor) -> Result<(), ContractError> {
    if contract.kind != ContractKind::Trait {
        return Err(ContractError::NotInterface {
            contract: contract.name.to_string(),
            kind: contract.kind.to_string(),
        });
    }
    Ok(())
}

fn require_no_properties(contract: &ContractDescriptor) -> Result<(), ContractError> {
    if !contract.properties.is_empty() {
        return Err(ContractError::HasProperties {
            contract: contract.name.to_string(),
            properties: to_owned_names(&contract.properties),
        });
    }
    Ok(())
}

fn require_no_events(contract: &ContractDescriptor) -> Result<(), ContractError> {
    if !contract.events.is_empty() {
        return Err(ContractError::HasEvents {
            contract: contract.name.to_string(),
            events: to_owned_names(&contract.events),
        });
    }
    Ok(())
}

fn require_closed(contract: &ContractDescriptor) -> Result<(), ContractError> {
    if !contract.type_params.is_empty() {
        return Err(ContractError::OpenGeneric {
            contract: contract.name.to_string(),
            params: to_owned_names(&contract.type_params),
        });
    }
    Ok(())
}

fn to_owned_names(names: &[&'static str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}
