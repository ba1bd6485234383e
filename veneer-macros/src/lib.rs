//! Procedural macros for veneer contracts.
//!
//! # Example
//!
//! ```rust,ignore
//! use veneer::contract;
//!
//! #[contract]
//! pub trait Lookup: Send + Sync {
//!     fn get(&self, key: String) -> i32;
//!     fn find(&self, prefix: &str, limit: usize) -> Result<Vec<String>, LookupError>;
//!     fn reload(&self);
//! }
//!
//! // Generated alongside the trait:
//! //   impl veneer::Contract for dyn Lookup { .. }
//! //   pub struct LookupMethods;  (GET, FIND, RELOAD method references)
//! //   impl veneer::CachingContract for dyn Lookup { .. }
//! //   impl veneer::TracingContract for dyn Lookup { .. }
//! ```

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::ext::IdentExt;
use syn::{
    parse_macro_input, FnArg, GenericArgument, GenericParam, Ident, ItemTrait, Pat, PathArguments,
    ReturnType, Signature, Token, TraitItem, TraitItemFn, Type, TypeParamBound, WherePredicate,
};

/// Marks a trait as a proxyable contract.
///
/// # Attributes
/// - `name = "Name"` - Contract name reported in errors and logs (defaults to the trait name)
/// - `trace_only` - Generate only the tracing proxy shape
///
/// # Example
/// ```rust,ignore
/// #[contract(name = "catalog")]
/// pub trait Catalog: Send + Sync {
///     fn price(&self, sku: &str) -> u64;
/// }
/// ```
#[proc_macro_attribute]
pub fn contract(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ContractArgs);
    let input = parse_macro_input!(item as ItemTrait);

    let expanded = expand_contract(args, input).unwrap_or_else(syn::Error::into_compile_error);
    TokenStream::from(expanded)
}

struct ContractArgs {
    name: Option<String>,
    trace_only: bool,
}

impl syn::parse::Parse for ContractArgs {
    fn parse(input: syn::parse::ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut trace_only = false;

        while !input.is_empty() {
            let ident: Ident = input.parse()?;

            match ident.to_string().as_str() {
                "name" => {
                    input.parse::<Token![=]>()?;
                    let value: syn::LitStr = input.parse()?;
                    name = Some(value.value());
                }
                "trace_only" => trace_only = true,
                _ => return Err(syn::Error::new(ident.span(), "unknown attribute")),
            }

            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(ContractArgs { name, trace_only })
    }
}

/// How a parameter reaches the method.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Passing {
    Owned,
    Shared,
    Exclusive,
}

/// What a method hands back.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Returns {
    Unit,
    Value,
    Fallible,
}

struct Param {
    name: String,
    binding: Ident,
    ty: Type,
    passing: Passing,
}

struct Method {
    index: usize,
    sig: Signature,
    params: Vec<Param>,
    returns: Returns,
}

impl Method {
    fn ident(&self) -> &Ident {
        &self.sig.ident
    }

    fn has_exclusive(&self) -> bool {
        self.params.iter().any(|p| p.passing == Passing::Exclusive)
    }

    /// The proxy-side signature, with parameters bound to `__argN`.
    fn proxy_sig(&self) -> Signature {
        let mut sig = self.sig.clone();
        let receiver = sig.inputs.iter().find(|arg| matches!(arg, FnArg::Receiver(_))).cloned();
        sig.inputs = receiver.into_iter().collect();
        for param in &self.params {
            let binding = &param.binding;
            let ty = &param.ty;
            sig.inputs.push(syn::parse_quote!(#binding: #ty));
        }
        sig
    }

    fn bindings(&self) -> Vec<&Ident> {
        self.params.iter().map(|p| &p.binding).collect()
    }
}

fn expand_contract(args: ContractArgs, input: ItemTrait) -> syn::Result<TokenStream2> {
    check_trait(&input)?;

    let methods = collect_methods(&input, args.trace_only)?;
    let trait_ident = &input.ident;
    let contract_name = args
        .name
        .unwrap_or_else(|| trait_ident.unraw().to_string());

    let descriptor = expand_descriptor(&contract_name, &methods);
    let method_refs = expand_method_refs(&input, &methods);
    let tracing = expand_tracing_shape(trait_ident, &methods);
    let caching = if args.trace_only {
        quote! {}
    } else {
        expand_caching_shape(trait_ident, &methods)
    };

    Ok(quote! {
        #input

        impl ::veneer::Contract for dyn #trait_ident {
            fn descriptor() -> ::veneer::ContractDescriptor {
                #descriptor
            }
        }

        #method_refs
        #caching
        #tracing
    })
}

fn check_trait(input: &ItemTrait) -> syn::Result<()> {
    let mut errors: Vec<syn::Error> = Vec::new();

    if let Some(unsafety) = &input.unsafety {
        errors.push(syn::Error::new_spanned(
            unsafety,
            "unsafe traits cannot be contracts",
        ));
    }
    if !input.generics.params.is_empty() {
        errors.push(syn::Error::new_spanned(
            &input.generics,
            "contract traits cannot be generic; declare a closed trait",
        ));
    }
    for bound in &input.supertraits {
        if let TypeParamBound::Trait(bound) = bound {
            let auto = bound
                .path
                .segments
                .last()
                .is_some_and(|s| s.ident == "Send" || s.ident == "Sync");
            if !auto {
                errors.push(syn::Error::new_spanned(
                    bound,
                    "only `Send` and `Sync` supertraits can be implemented by a proxy",
                ));
            }
        }
    }

    for item in &input.items {
        match item {
            TraitItem::Fn(_) => {}
            TraitItem::Const(item) => errors.push(syn::Error::new_spanned(
                &item.ident,
                "associated constants are properties; contracts cannot carry properties",
            )),
            TraitItem::Type(item) => errors.push(syn::Error::new_spanned(
                &item.ident,
                "associated types are properties; contracts cannot carry properties",
            )),
            other => errors.push(syn::Error::new_spanned(
                other,
                "unsupported item in contract trait",
            )),
        }
    }

    combine(errors)
}

fn collect_methods(input: &ItemTrait, trace_only: bool) -> syn::Result<Vec<Method>> {
    let mut methods = Vec::new();
    let mut errors = Vec::new();

    let fns = input.items.iter().filter_map(|item| match item {
        TraitItem::Fn(method) => Some(method),
        _ => None,
    });

    for (index, method) in fns.enumerate() {
        match collect_method(index, method, trace_only) {
            Ok(method) => methods.push(method),
            Err(e) => errors.push(e),
        }
    }

    combine(errors)?;
    Ok(methods)
}

fn collect_method(index: usize, method: &TraitItemFn, trace_only: bool) -> syn::Result<Method> {
    let sig = &method.sig;
    let mut errors = Vec::new();

    if let Some(asyncness) = &sig.asyncness {
        errors.push(syn::Error::new_spanned(
            asyncness,
            "async methods cannot be proxied",
        ));
    }
    if let Some(unsafety) = &sig.unsafety {
        errors.push(syn::Error::new_spanned(
            unsafety,
            "unsafe methods cannot be proxied",
        ));
    }
    if sig
        .generics
        .params
        .iter()
        .any(|p| !matches!(p, GenericParam::Lifetime(_)))
    {
        errors.push(syn::Error::new_spanned(
            &sig.generics,
            "generic methods cannot be proxied",
        ));
    }
    if requires_sized(sig) {
        errors.push(syn::Error::new_spanned(
            &sig.ident,
            "methods bounded by `Self: Sized` cannot be proxied",
        ));
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        Some(receiver) => errors.push(syn::Error::new_spanned(
            receiver,
            "contract methods must take `&self`",
        )),
        None => errors.push(syn::Error::new_spanned(
            &sig.ident,
            "contract methods must take `&self`",
        )),
    }

    let returns = classify_return(&sig.output);
    if !trace_only && returns != Returns::Unit {
        if let ReturnType::Type(_, ty) = &sig.output {
            if borrows_non_static(ty) {
                errors.push(syn::Error::new_spanned(
                    ty,
                    "cached results must be owned; use #[contract(trace_only)] for borrowed returns",
                ));
            }
        }
    }

    let params = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(arg) => Some(arg),
            FnArg::Receiver(_) => None,
        })
        .enumerate()
        .map(|(i, arg)| {
            let name = match &*arg.pat {
                Pat::Ident(pat) => pat.ident.unraw().to_string(),
                _ => format!("arg{i}"),
            };
            let passing = match &*arg.ty {
                Type::Reference(r) if r.mutability.is_some() => Passing::Exclusive,
                Type::Reference(_) => Passing::Shared,
                _ => Passing::Owned,
            };
            Param {
                name,
                binding: format_ident!("__arg{}", i),
                ty: (*arg.ty).clone(),
                passing,
            }
        })
        .collect::<Vec<Param>>();

    if !trace_only && returns != Returns::Unit {
        for param in params.iter().filter(|p| borrows_trait_object(&p.ty)) {
            errors.push(syn::Error::new_spanned(
                &param.ty,
                "trait-object parameters cannot form a cache key; \
                 use #[contract(trace_only)] or pass an owned key",
            ));
        }
    }

    combine(errors)?;
    Ok(Method {
        index,
        sig: sig.clone(),
        params,
        returns,
    })
}

fn requires_sized(sig: &Signature) -> bool {
    let Some(where_clause) = &sig.generics.where_clause else {
        return false;
    };
    where_clause.predicates.iter().any(|predicate| match predicate {
        WherePredicate::Type(predicate) => {
            let is_self = matches!(&predicate.bounded_ty, Type::Path(p) if p.path.is_ident("Self"));
            is_self
                && predicate.bounds.iter().any(|bound| {
                    matches!(bound, TypeParamBound::Trait(t)
                        if t.path.segments.last().is_some_and(|s| s.ident == "Sized"))
                })
        }
        _ => false,
    })
}

/// `Result<(), E>` reports failure but carries nothing to cache, so it is
/// classified with the unit returns.
fn classify_return(output: &ReturnType) -> Returns {
    match output {
        ReturnType::Default => Returns::Unit,
        ReturnType::Type(_, ty) => match &**ty {
            Type::Tuple(tuple) if tuple.elems.is_empty() => Returns::Unit,
            Type::Path(path) => match path.path.segments.last() {
                Some(last) if last.ident == "Result" => match ok_type(&last.arguments) {
                    Some(Type::Tuple(tuple)) if tuple.elems.is_empty() => Returns::Unit,
                    _ => Returns::Fallible,
                },
                _ => Returns::Value,
            },
            _ => Returns::Value,
        },
    }
}

fn ok_type(arguments: &PathArguments) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = arguments else {
        return None;
    };
    args.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// `&dyn Trait` parameters have no owned form to key a cache on.
fn borrows_trait_object(ty: &Type) -> bool {
    match ty {
        Type::Reference(r) => matches!(&*r.elem, Type::TraitObject(_)),
        Type::Paren(p) => borrows_trait_object(&p.elem),
        Type::Group(g) => borrows_trait_object(&g.elem),
        _ => false,
    }
}

fn borrows_non_static(ty: &Type) -> bool {
    match ty {
        Type::Reference(r) => !r.lifetime.as_ref().is_some_and(|l| l.ident == "static"),
        Type::Paren(p) => borrows_non_static(&p.elem),
        Type::Group(g) => borrows_non_static(&g.elem),
        _ => false,
    }
}

fn expand_descriptor(contract_name: &str, methods: &[Method]) -> TokenStream2 {
    let with_methods = methods.iter().map(|method| {
        let name = method.ident().unraw().to_string();
        let params = method.params.iter().map(|param| {
            let param_name = &param.name;
            let type_name = type_name(&param.ty);
            let mode = match param.passing {
                Passing::Owned => quote!(::veneer::PassingMode::Owned),
                Passing::Shared => quote!(::veneer::PassingMode::Shared),
                Passing::Exclusive => quote!(::veneer::PassingMode::Exclusive),
            };
            quote!(.param(#param_name, #type_name, #mode))
        });
        let returns = match (&method.sig.output, method.returns) {
            (ReturnType::Type(_, ty), Returns::Unit) => {
                let type_name = type_name(ty);
                quote!(.returns(::veneer::ReturnShape::Unit, #type_name))
            }
            (ReturnType::Type(_, ty), Returns::Value) => {
                let type_name = type_name(ty);
                quote!(.returns(::veneer::ReturnShape::Value, #type_name))
            }
            (ReturnType::Type(_, ty), Returns::Fallible) => {
                let type_name = type_name(ty);
                quote!(.returns(::veneer::ReturnShape::Fallible, #type_name))
            }
            _ => quote!(),
        };
        quote! {
            .with_method(
                ::veneer::MethodDescriptor::new(#name)
                    #(#params)*
                    #returns
            )
        }
    });

    quote! {
        ::veneer::ContractDescriptor::interface(#contract_name)
            #(#with_methods)*
    }
}

fn expand_method_refs(input: &ItemTrait, methods: &[Method]) -> TokenStream2 {
    let vis = &input.vis;
    let trait_ident = &input.ident;
    let holder = format_ident!("{}Methods", trait_ident.unraw());
    let doc = format!("Method references for [`{}`].", trait_ident.unraw());

    let consts = methods.iter().map(|method| {
        let name = method.ident().unraw().to_string();
        let const_ident = Ident::new(&name.to_uppercase(), Span::call_site());
        let index = method.index;
        quote! {
            pub const #const_ident: ::veneer::MethodRef<dyn #trait_ident> =
                ::veneer::MethodRef::new(#index, #name);
        }
    });

    quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, Copy)]
        #vis struct #holder;

        #[allow(dead_code)]
        impl #holder {
            #(#consts)*
        }
    }
}

fn expand_caching_shape(trait_ident: &Ident, methods: &[Method]) -> TokenStream2 {
    let proxy = format_ident!("__VeneerCaching{}", trait_ident.unraw());

    let bodies = methods.iter().map(|method| {
        let sig = method.proxy_sig();
        let ident = method.ident();
        let index = method.index;
        let args = method.bindings();

        // Never synthesized; the engine rejects `&mut` parameters at build time.
        if method.has_exclusive() {
            return quote! {
                #sig {
                    self.inner.#ident(#(#args),*)
                }
            };
        }

        let body = match method.returns {
            Returns::Unit => quote! {
                self.core.unit(#index, || self.inner.#ident(#(#args),*))
            },
            Returns::Value | Returns::Fallible => {
                let entry = if method.returns == Returns::Value {
                    quote!(value)
                } else {
                    quote!(fallible)
                };
                let key = key_projection(method);
                quote! {
                    self.core.#entry(
                        #index,
                        (#(#args,)*),
                        #key,
                        |(#(#args,)*)| self.inner.#ident(#(#args),*),
                    )
                }
            }
        };

        quote! {
            #sig {
                #body
            }
        }
    });

    quote! {
        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        struct #proxy {
            inner: ::std::sync::Arc<dyn #trait_ident>,
            core: ::veneer::CachingCore,
        }

        impl #trait_ident for #proxy {
            #(#bodies)*
        }

        impl ::veneer::CachingContract for dyn #trait_ident {
            fn caching_proxy(
                inner: ::std::sync::Arc<Self>,
                core: ::veneer::CachingCore,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(#proxy { inner, core })
            }
        }
    }
}

/// Closure projecting `&(args,)` onto an owned cache key.
fn key_projection(method: &Method) -> TokenStream2 {
    if method.params.is_empty() {
        return quote!(|_| ());
    }

    let args = method.bindings();
    let parts: Vec<TokenStream2> = method
        .params
        .iter()
        .map(|param| {
            let binding = &param.binding;
            match (&param.passing, &param.ty) {
                (Passing::Shared, Type::Reference(r)) => {
                    let elem = &r.elem;
                    quote!(<#elem as ::std::borrow::ToOwned>::to_owned(*#binding))
                }
                _ => quote!(::std::clone::Clone::clone(#binding)),
            }
        })
        .collect();

    let key = if parts.len() == 1 {
        quote!(#(#parts)*)
    } else {
        quote!((#(#parts),*))
    };

    quote!(|(#(#args,)*)| #key)
}

fn expand_tracing_shape(trait_ident: &Ident, methods: &[Method]) -> TokenStream2 {
    let proxy = format_ident!("__VeneerTracing{}", trait_ident.unraw());

    let bodies = methods.iter().map(|method| {
        let sig = method.proxy_sig();
        let ident = method.ident();
        let index = method.index;
        let args = method.bindings();
        quote! {
            #sig {
                self.core.trace(#index, &*self.inner, || self.inner.#ident(#(#args),*))
            }
        }
    });

    quote! {
        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        struct #proxy {
            inner: ::std::sync::Arc<dyn #trait_ident>,
            core: ::veneer::TraceCore<dyn #trait_ident>,
        }

        impl #trait_ident for #proxy {
            #(#bodies)*
        }

        impl ::veneer::TracingContract for dyn #trait_ident {
            fn tracing_proxy(
                inner: ::std::sync::Arc<Self>,
                core: ::veneer::TraceCore<Self>,
            ) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new(#proxy { inner, core })
            }
        }
    }
}

/// Source-like rendering of a type: `Result<u32, String>`, `&'a str`.
fn type_name(ty: &Type) -> String {
    let raw = quote!(#ty).to_string();
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ' ' {
            out.push(c);
            continue;
        }
        let prev = out.chars().last();
        if (is_word(prev) && is_word(chars.peek().copied())) || prev == Some(',') {
            out.push(' ');
        }
    }
    out
}

fn combine(errors: Vec<syn::Error>) -> syn::Result<()> {
    let mut errors = errors.into_iter();
    match errors.next() {
        None => Ok(()),
        Some(mut first) => {
            for e in errors {
                first.combine(e);
            }
            Err(first)
        }
    }
}
