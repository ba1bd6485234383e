//! Contract model: the reflected shape of a trait that proxies are built for.
//!
//! A contract is a trait object type such as `dyn Lookup`. Its shape is
//! reported by [`Contract::descriptor`], normally generated by the
//! `#[veneer::contract]` attribute but hand-writable for traits the macro
//! does not cover.
//!
//! ```rust,ignore
//! #[veneer::contract]
//! pub trait Lookup: Send + Sync {
//!     fn get(&self, key: String) -> i32;
//! }
//!
//! let descriptor = <dyn Lookup as Contract>::descriptor();
//! assert_eq!(descriptor.methods[0].name, "get");
//! ```

pub mod validation;

use std::fmt;
use std::marker::PhantomData;

pub use validation::{validate, validate_build};

/// A trait object type that proxies can be synthesized for.
pub trait Contract: 'static {
    /// Reflected shape of the contract.
    fn descriptor() -> ContractDescriptor;
}

/// What sort of type a descriptor was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    Trait,
    Struct,
    Enum,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Trait => write!(f, "trait"),
            ContractKind::Struct => write!(f, "struct"),
            ContractKind::Enum => write!(f, "enum"),
        }
    }
}

/// How an argument is handed to a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassingMode {
    /// By value (`T`).
    Owned,
    /// By shared reference (`&T`).
    Shared,
    /// By exclusive reference (`&mut T`). Never proxied.
    Exclusive,
}

impl fmt::Display for PassingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassingMode::Owned => write!(f, "value"),
            PassingMode::Shared => write!(f, "shared reference"),
            PassingMode::Exclusive => write!(f, "exclusive reference"),
        }
    }
}

/// What a method hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnShape {
    /// No value: `()`, or `Result<(), E>` where only the failure is reported.
    Unit,
    /// A plain value.
    Value,
    /// A `Result<T, E>`; only `Ok` values are cacheable.
    Fallible,
}

impl ReturnShape {
    /// Returns true if the method produces something a cache could hold.
    pub fn returns_value(self) -> bool {
        !matches!(self, ReturnShape::Unit)
    }
}

/// A single method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub type_name: &'static str,
    pub mode: PassingMode,
}

/// A single contract method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub params: Vec<ParamDescriptor>,
    pub returns: ReturnShape,
    pub return_type: &'static str,
    /// Declares its own type parameters.
    pub generic: bool,
}

impl MethodDescriptor {
    /// A method with no parameters and no return value.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
            returns: ReturnShape::Unit,
            return_type: "()",
            generic: false,
        }
    }

    /// Append a parameter.
    pub fn param(mut self, name: &'static str, type_name: &'static str, mode: PassingMode) -> Self {
        self.params.push(ParamDescriptor {
            name,
            type_name,
            mode,
        });
        self
    }

    /// Set the return shape.
    pub fn returns(mut self, shape: ReturnShape, type_name: &'static str) -> Self {
        self.returns = shape;
        self.return_type = type_name;
        self
    }

    /// Mark the method as declaring type parameters.
    pub fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// The reflected shape of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub name: &'static str,
    pub kind: ContractKind,
    pub methods: Vec<MethodDescriptor>,
    pub properties: Vec<&'static str>,
    pub events: Vec<&'static str>,
    pub type_params: Vec<&'static str>,
}

impl ContractDescriptor {
    /// An empty descriptor of the given kind.
    pub fn new(name: &'static str, kind: ContractKind) -> Self {
        Self {
            name,
            kind,
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            type_params: Vec::new(),
        }
    }

    /// An empty trait descriptor.
    pub fn interface(name: &'static str) -> Self {
        Self::new(name, ContractKind::Trait)
    }

    /// Append a method. Methods are identified by their position.
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_property(mut self, name: &'static str) -> Self {
        self.properties.push(name);
        self
    }

    pub fn with_event(mut self, name: &'static str) -> Self {
        self.events.push(name);
        self
    }

    pub fn with_type_param(mut self, name: &'static str) -> Self {
        self.type_params.push(name);
        self
    }

    pub fn method(&self, index: usize) -> Option<&MethodDescriptor> {
        self.methods.get(index)
    }

    /// Position of the method with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m.name == name)
    }
}

/// Typed reference to one method of contract `C`.
///
/// Generated as constants on the `<Trait>Methods` type, so configuration
/// names methods by reference and cannot mix up contracts.
pub struct MethodRef<C: ?Sized> {
    index: usize,
    name: &'static str,
    _contract: PhantomData<fn(&C)>,
}

impl<C: ?Sized> MethodRef<C> {
    pub const fn new(index: usize, name: &'static str) -> Self {
        Self {
            index,
            name,
            _contract: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<C: ?Sized> Clone for MethodRef<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: ?Sized> Copy for MethodRef<C> {}

impl<C: ?Sized> PartialEq for MethodRef<C> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<C: ?Sized> Eq for MethodRef<C> {}

impl<C: ?Sized> fmt::Debug for MethodRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRef")
            .field("index", &self.index)
            .field("name", &self.name)
            .finish()
    }
}
