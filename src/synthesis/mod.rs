//! Dispatch-table synthesis.
//!
//! A proxy struct generated by `#[contract]` forwards every method into its
//! engine core by position. The core decides what to do through the
//! contract's [`SynthesizedContract`]: one [`MethodPlan`] per method, holding
//! the selected [`Strategy`] and the index of the per-proxy cell it uses.
//!
//! Tables are built once per contract and engine and shared by every proxy
//! of that contract (see [`registry`]).

pub mod registry;

use std::fmt;

use tracing::{debug, info};

use crate::behavior::BehaviorTable;
use crate::contract::{ContractDescriptor, MethodDescriptor, PassingMode};
use crate::error::SynthesisError;
use crate::selector::{select_caching, select_tracing, Strategy};

pub use registry::{SynthesisCache, SynthesisStats};

/// Which engine a table was synthesized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Caching,
    Tracing,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Caching => write!(f, "caching"),
            EngineKind::Tracing => write!(f, "tracing"),
        }
    }
}

/// Knobs that shape synthesis but are not part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub honor_expiration: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            honor_expiration: true,
        }
    }
}

/// Plan for one contract method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodPlan {
    pub index: usize,
    pub name: &'static str,
    pub strategy: Strategy,
    /// Per-proxy cell slot, for strategies that cache.
    pub cell: Option<usize>,
}

/// The synthesized implementation of a contract for one engine.
#[derive(Debug)]
pub struct SynthesizedContract {
    engine: EngineKind,
    contract: &'static str,
    plans: Vec<MethodPlan>,
    cell_count: usize,
    behaviors: BehaviorTable,
}

impl SynthesizedContract {
    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn contract(&self) -> &'static str {
        self.contract
    }

    pub fn plan(&self, method: usize) -> Option<&MethodPlan> {
        self.plans.get(method)
    }

    pub fn plans(&self) -> &[MethodPlan] {
        &self.plans
    }

    /// Number of cells each proxy instance carries.
    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    /// The configuration embedded at synthesis time.
    pub fn behaviors(&self) -> &BehaviorTable {
        &self.behaviors
    }
}

/// Build the dispatch table for `descriptor`.
///
/// The descriptor is assumed to have passed validation. `behaviors` is only
/// consulted by the caching engine.
pub fn synthesize(
    engine: EngineKind,
    descriptor: &ContractDescriptor,
    behaviors: &BehaviorTable,
    options: SynthesisOptions,
) -> Result<SynthesizedContract, SynthesisError> {
    for (index, _) in behaviors.iter() {
        if descriptor.method(index).is_none() {
            return Err(SynthesisError::UnknownMethod {
                contract: descriptor.name.to_string(),
                index,
            });
        }
    }

    let mut plans = Vec::with_capacity(descriptor.methods.len());
    let mut cell_count = 0;

    for (index, method) in descriptor.methods.iter().enumerate() {
        check_signature(descriptor, method)?;

        let strategy = match engine {
            EngineKind::Caching => {
                select_caching(method, behaviors.get(index), options.honor_expiration)
            }
            EngineKind::Tracing => select_tracing(method),
        };

        let cell = if strategy.needs_cell() {
            cell_count += 1;
            Some(cell_count - 1)
        } else {
            None
        };

        debug!(
            contract = descriptor.name,
            method = method.name,
            %strategy,
            "Planned method"
        );

        plans.push(MethodPlan {
            index,
            name: method.name,
            strategy,
            cell,
        });
    }

    info!(
        contract = descriptor.name,
        %engine,
        methods = plans.len(),
        cells = cell_count,
        "Synthesized contract"
    );

    Ok(SynthesizedContract {
        engine,
        contract: descriptor.name,
        plans,
        cell_count,
        behaviors: match engine {
            EngineKind::Caching => behaviors.clone(),
            EngineKind::Tracing => BehaviorTable::new(),
        },
    })
}

fn check_signature(
    descriptor: &ContractDescriptor,
    method: &MethodDescriptor,
) -> Result<(), SynthesisError> {
    if method.generic {
        return Err(SynthesisError::GenericMethod {
            contract: descriptor.name.to_string(),
            method: method.name.to_string(),
        });
    }

    if let Some(param) = method
        .params
        .iter()
        .find(|p| p.mode == PassingMode::Exclusive)
    {
        return Err(SynthesisError::UnsupportedParameter {
            contract: descriptor.name.to_string(),
            method: method.name.to_string(),
            param: param.name.to_string(),
            mode: param.mode.to_string(),
        });
    }

    Ok(())
}
