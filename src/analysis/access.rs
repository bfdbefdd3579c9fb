//! Generatability checks.
//!
//! Generated code is compiled into the emitting assembly and calls user code directly, so
//! everything it names must be reachable from there without reflection. [`Generatability`]
//! answers that question for types and methods:
//!
//! - the declared accessibility is public, or internal (protected internal) while the declaring
//!   assembly is the emitting assembly or grants it friend access
//! - every containing type passes the same check
//! - no pointer, by-ref, function pointer, typed reference or ref-like type occurs in the shape
//! - `void` only occurs as a return type
//! - no unresolved type parameter occurs anywhere
//!
//! Generic instantiations recurse through their arguments and arrays through their element.
//! Failing symbols are filtered, never reported.

use crate::model::{Accessibility, MethodSymbol, ProgramModel, Token, TypeSignature, TypeSymbol};

/// Decides whether symbols can be named by generated code
pub struct Generatability<'a> {
    model: &'a ProgramModel,
    assembly: &'a str,
}

impl<'a> Generatability<'a> {
    /// Creates a checker for code emitted into `assembly`
    #[must_use]
    pub fn new(model: &'a ProgramModel, assembly: &'a str) -> Self {
        Generatability { model, assembly }
    }

    /// Returns true if a signature can be named in generated code.
    ///
    /// `void` is rejected; use [`Generatability::is_return_type_generatable`] for return types.
    #[must_use]
    pub fn is_type_generatable(&self, sig: &TypeSignature) -> bool {
        match sig {
            TypeSignature::Unknown | TypeSignature::Void => false,
            TypeSignature::GenericParamType(_) | TypeSignature::GenericParamMethod(_) => false,
            sig if sig.is_unbindable() => false,
            TypeSignature::SzArray(element) | TypeSignature::Array { base: element, .. } => {
                self.is_type_generatable(element)
            }
            TypeSignature::GenericInst(base, args) => {
                let Some(token) = base.token() else {
                    return false;
                };
                self.is_definition_accessible(token)
                    && args.len() == self.model.generic_params_of(token).len()
                    && args.iter().all(|arg| self.is_type_generatable(arg))
            }
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => {
                self.model
                    .get_type(*token)
                    .is_some_and(|symbol| !symbol.is_generic())
                    && self.is_definition_accessible(*token)
            }
            _ => true,
        }
    }

    /// Returns true if a signature can be the return type of a called member
    #[must_use]
    pub fn is_return_type_generatable(&self, sig: &TypeSignature) -> bool {
        sig.is_void() || self.is_type_generatable(sig)
    }

    /// Returns true if the method can be called directly from generated code once the
    /// given type and method arguments are applied.
    #[must_use]
    pub fn is_method_generatable(
        &self,
        method: &MethodSymbol,
        type_args: &[TypeSignature],
        method_args: &[TypeSignature],
    ) -> bool {
        if !self.is_member_accessible(method.accessibility) {
            return false;
        }
        if method.generic_params.len() != method_args.len() {
            return false;
        }
        if !method_args.iter().all(|arg| self.is_type_generatable(arg)) {
            return false;
        }

        let return_type = method.return_type.substitute(type_args, method_args);
        if !self.is_return_type_generatable(&return_type) {
            return false;
        }

        method.parameters.iter().all(|param| {
            let sig = param.signature.substitute(type_args, method_args);
            self.is_type_generatable(&sig)
        })
    }

    /// Returns true if the type definition and all of its containing types are accessible
    #[must_use]
    pub fn is_definition_accessible(&self, token: Token) -> bool {
        let mut current = self.model.get_type(token);
        let mut depth = 0;

        while let Some(symbol) = current {
            if !self.is_symbol_accessible(&symbol) || symbol.is_ref_like() {
                return false;
            }
            depth += 1;
            if depth > 32 {
                return false;
            }
            current = symbol
                .declaring_type
                .and_then(|outer| self.model.get_type(outer));
        }

        depth > 0
    }

    /// Returns true if a member with `accessibility` on an accessible type can be called
    #[must_use]
    pub fn is_member_accessible(&self, accessibility: Accessibility) -> bool {
        matches!(
            accessibility,
            Accessibility::Public | Accessibility::Internal | Accessibility::ProtectedInternal
        )
    }

    fn is_symbol_accessible(&self, symbol: &TypeSymbol) -> bool {
        match symbol.accessibility {
            Accessibility::Public => true,
            Accessibility::Internal | Accessibility::ProtectedInternal => self
                .model
                .grants_internals(&symbol.assembly, self.assembly),
            _ => false,
        }
    }
}

/// Returns true if any open type or method parameter occurs in the declaring type, the
/// method's own type parameters or its parameter and return types
#[must_use]
pub fn contains_open_parameter(
    declaring_type: &TypeSignature,
    method: &MethodSymbol,
    method_args: &[TypeSignature],
) -> bool {
    if declaring_type.contains_generic_param() {
        return true;
    }
    if method.generic_params.len() != method_args.len()
        || method_args.iter().any(TypeSignature::contains_generic_param)
    {
        return true;
    }

    let type_args = declaring_type.generic_arguments();
    method
        .parameters
        .iter()
        .map(|param| &param.signature)
        .chain(std::iter::once(&method.return_type))
        .any(|sig| sig.substitute(type_args, method_args).contains_generic_param())
}
