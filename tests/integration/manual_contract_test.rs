//! Contracts described by hand rather than by `#[contract]`.
//!
//! Hand-written descriptors are how non-trait, property-bearing,
//! event-bearing and open generic shapes reach the engines; all of them must
//! be rejected before anything is synthesized.

use std::sync::Arc;

use veneer::{
    CachingContract, CachingCore, CachingEngine, Contract, ContractDescriptor, ContractError,
    ContractKind, MethodDescriptor, ProxyError, ReturnShape, TraceCore, TracingContract,
    TracingEngine,
};

macro_rules! manual_contract {
    ($name:ident, $descriptor:expr) => {
        #[allow(dead_code)]
        trait $name: Send + Sync {
            fn size(&self) -> usize;
        }

        impl Contract for dyn $name {
            fn descriptor() -> ContractDescriptor {
                $descriptor
            }
        }

        impl CachingContract for dyn $name {
            fn caching_proxy(inner: Arc<Self>, _core: CachingCore) -> Arc<Self> {
                inner
            }
        }

        impl TracingContract for dyn $name {
            fn tracing_proxy(inner: Arc<Self>, _core: TraceCore<Self>) -> Arc<Self> {
                inner
            }
        }

        impl $name for Fixed {
            fn size(&self) -> usize {
                3
            }
        }
    };
}

struct Fixed;

fn size_method() -> MethodDescriptor {
    MethodDescriptor::new("size").returns(ReturnShape::Value, "usize")
}

manual_contract!(
    Record,
    ContractDescriptor::new("Record", ContractKind::Struct).with_method(size_method())
);
manual_contract!(
    Mode,
    ContractDescriptor::new("Mode", ContractKind::Enum).with_method(size_method())
);
manual_contract!(
    Measured,
    ContractDescriptor::interface("Measured")
        .with_method(size_method())
        .with_property("capacity")
);
manual_contract!(
    Notifying,
    ContractDescriptor::interface("Notifying")
        .with_method(size_method())
        .with_event("changed")
);
manual_contract!(
    Boxed,
    ContractDescriptor::interface("Boxed")
        .with_method(size_method())
        .with_type_param("T")
);

fn rejected_by_both<C>(inner: Arc<C>) -> (ContractError, ContractError)
where
    C: CachingContract + TracingContract + ?Sized,
{
    let caching = CachingEngine::new();
    let tracing = TracingEngine::new();

    let cache_err = caching
        .build(inner.clone(), |_| {})
        .err()
        .expect("caching build must fail");
    let trace_err = tracing
        .build(inner, |_, _: &str| {}, |_, _: &str| {})
        .err()
        .expect("tracing build must fail");

    assert!(cache_err.is_contract_violation());
    assert!(trace_err.is_contract_violation());
    assert!(caching.synthesized::<C>().is_none());
    assert!(tracing.synthesized::<C>().is_none());
    assert_eq!(caching.stats().snapshot(), (0, 0, 0));

    let unwrap = |err: ProxyError| match err {
        ProxyError::Contract(e) => e,
        other => panic!("expected a contract violation, got {other}"),
    };
    (unwrap(cache_err), unwrap(trace_err))
}

#[test]
fn test_struct_contract_rejected() {
    let inner: Arc<dyn Record> = Arc::new(Fixed);
    let (cache_err, trace_err) = rejected_by_both(inner);
    assert_eq!(
        cache_err,
        ContractError::NotInterface {
            contract: "Record".to_string(),
            kind: "struct".to_string(),
        }
    );
    assert_eq!(cache_err, trace_err);
}

#[test]
fn test_enum_contract_rejected() {
    let inner: Arc<dyn Mode> = Arc::new(Fixed);
    let (cache_err, _) = rejected_by_both(inner);
    assert!(matches!(cache_err, ContractError::NotInterface { .. }));
    assert_eq!(cache_err.contract(), "Mode");
}

#[test]
fn test_property_bearing_contract_rejected() {
    let inner: Arc<dyn Measured> = Arc::new(Fixed);
    let (cache_err, _) = rejected_by_both(inner);
    assert_eq!(
        cache_err,
        ContractError::HasProperties {
            contract: "Measured".to_string(),
            properties: vec!["capacity".to_string()],
        }
    );
}

#[test]
fn test_event_bearing_contract_rejected() {
    let inner: Arc<dyn Notifying> = Arc::new(Fixed);
    let (cache_err, _) = rejected_by_both(inner);
    assert!(matches!(cache_err, ContractError::HasEvents { .. }));
    assert_eq!(
        cache_err.to_string(),
        "contract Notifying declares events: [\"changed\"]"
    );
}

#[test]
fn test_open_generic_contract_rejected() {
    let inner: Arc<dyn Boxed> = Arc::new(Fixed);
    let (cache_err, _) = rejected_by_both(inner);
    assert!(matches!(cache_err, ContractError::OpenGeneric { .. }));
}

#[test]
fn test_missing_inner_reported_first() {
    // A struct contract, but the missing inner instance is reported instead.
    let err = CachingEngine::new()
        .builder::<dyn Record>()
        .build()
        .err()
        .expect("build without inner must fail");
    assert!(matches!(
        err,
        ProxyError::Contract(ContractError::MissingInner { .. })
    ));

    let err = TracingEngine::new()
        .builder::<dyn Record>()
        .build()
        .err()
        .expect("build without inner must fail");
    assert_eq!(
        err.to_string(),
        "invalid contract: no inner instance supplied for contract Record"
    );
}
