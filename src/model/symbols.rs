//! Symbols of the program model.
//!
//! These are the declarations the generator reasons about: types, methods, properties,
//! fields and parameters, together with their accessibility, modifiers, generic parameters
//! and attributes. Symbols are immutable once inserted into the
//! [`crate::model::ProgramModel`] and are shared through [`Arc`].
//!
//! # Key Types
//! - [`TypeSymbol`], [`MethodSymbol`], [`PropertySymbol`], [`FieldSymbol`], [`ParameterSymbol`]
//! - [`Accessibility`]: declared accessibility
//! - [`TypeModifiers`], [`MethodModifiers`]: declaration modifiers
//! - [`GenericParam`], [`GenericConstraint`]: generic parameter declarations
//! - [`Location`], [`InvocationSite`]: source positions and recorded call sites

use std::{fmt, sync::Arc};

use bitflags::bitflags;

use crate::model::{AttributeData, Token, TypeSignature};

/// A reference counted type symbol
pub type TypeRc = Arc<TypeSymbol>;
/// A reference counted method symbol
pub type MethodRc = Arc<MethodSymbol>;
/// A reference counted property symbol
pub type PropertyRc = Arc<PropertySymbol>;
/// A reference counted field symbol
pub type FieldRc = Arc<FieldSymbol>;

/// Declared accessibility of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Accessibility {
    /// `private`
    Private,
    /// `private protected`
    PrivateProtected,
    /// `protected`
    Protected,
    /// `internal`
    Internal,
    /// `protected internal`
    ProtectedInternal,
    /// `public`
    Public,
}

impl Accessibility {
    /// Returns true if the symbol is reachable from any code of its own assembly
    #[must_use]
    pub fn is_assembly_visible(&self) -> bool {
        matches!(
            self,
            Accessibility::Internal | Accessibility::ProtectedInternal | Accessibility::Public
        )
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Accessibility::Private => "private",
            Accessibility::PrivateProtected => "private protected",
            Accessibility::Protected => "protected",
            Accessibility::Internal => "internal",
            Accessibility::ProtectedInternal => "protected internal",
            Accessibility::Public => "public",
        };
        write!(f, "{keyword}")
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Modifiers of a type declaration
    pub struct TypeModifiers: u32 {
        /// Type is abstract
        const ABSTRACT = 0x0001;
        /// Type is sealed
        const SEALED = 0x0002;
        /// Type is a static class
        const STATIC = 0x0004;
        /// Type is an interface
        const INTERFACE = 0x0008;
        /// Type is a value type
        const VALUE_TYPE = 0x0010;
        /// Type is a stack-only `ref struct`
        const REF_LIKE = 0x0020;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Modifiers of a method declaration
    pub struct MethodModifiers: u32 {
        /// Method is static
        const STATIC = 0x0001;
        /// Method is abstract
        const ABSTRACT = 0x0002;
        /// Method is virtual
        const VIRTUAL = 0x0004;
        /// Method is an instance constructor
        const CONSTRUCTOR = 0x0008;
        /// Method is declared `async`
        const ASYNC = 0x0010;
    }
}

/// A constraint on a generic parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericConstraint {
    /// `where T : class`
    ReferenceType,
    /// `where T : struct`
    ValueType,
    /// `where T : notnull`
    NotNull,
    /// `where T : new()`
    DefaultConstructor,
    /// `where T : SomeType`
    Type(TypeSignature),
}

/// A generic parameter declared on a type or method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericParam {
    /// Declared name, e.g. `T`
    pub name: String,
    /// Zero based position in the parameter list
    pub index: u32,
    /// Declared constraints
    pub constraints: Vec<GenericConstraint>,
}

/// A position in a source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    /// Path of the source file
    pub file: String,
    /// One based line
    pub line: u32,
    /// One based column
    pub column: u32,
}

impl Location {
    /// Creates a new location
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Location {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.file, self.line, self.column)
    }
}

/// A type definition
#[derive(Debug)]
pub struct TypeSymbol {
    /// Identity of this type
    pub token: Token,
    /// Namespace, empty for the global namespace and for nested types
    pub namespace: String,
    /// Simple name without generic arity
    pub name: String,
    /// Name of the defining assembly
    pub assembly: String,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Declaration modifiers
    pub modifiers: TypeModifiers,
    /// Containing type for nested types
    pub declaring_type: Option<Token>,
    /// Base type, `None` for `System.Object`, interfaces and value types
    pub base_type: Option<TypeSignature>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeSignature>,
    /// Declared generic parameters
    pub generic_params: Vec<GenericParam>,
    /// Attributes applied to the type
    pub attributes: Vec<AttributeData>,
    /// Methods in declaration order
    pub methods: Vec<Token>,
    /// Properties in declaration order
    pub properties: Vec<Token>,
    /// Fields in declaration order
    pub fields: Vec<Token>,
    /// Declaration site
    pub location: Option<Location>,
}

impl TypeSymbol {
    /// Returns true if the type is abstract, static or an interface
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.intersects(
            TypeModifiers::ABSTRACT | TypeModifiers::STATIC | TypeModifiers::INTERFACE,
        )
    }

    /// Returns true for interfaces
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.modifiers.contains(TypeModifiers::INTERFACE)
    }

    /// Returns true for value types
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        self.modifiers.contains(TypeModifiers::VALUE_TYPE)
    }

    /// Returns true for `ref struct` types
    #[must_use]
    pub fn is_ref_like(&self) -> bool {
        self.modifiers.contains(TypeModifiers::REF_LIKE)
    }

    /// Returns true if the type declares generic parameters
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Returns the metadata name, including the generic arity suffix (`Name`1`)
    #[must_use]
    pub fn metadata_name(&self) -> String {
        if self.generic_params.is_empty() {
            self.name.clone()
        } else {
            format!("{}`{}", self.name, self.generic_params.len())
        }
    }

    /// Returns the open signature of this type: `Class(token)` or, for generic types,
    /// the instantiation over its own type parameters
    #[must_use]
    pub fn open_signature(&self) -> TypeSignature {
        let base = if self.is_value_type() {
            TypeSignature::ValueType(self.token)
        } else {
            TypeSignature::Class(self.token)
        };

        if self.generic_params.is_empty() {
            base
        } else {
            TypeSignature::GenericInst(
                Box::new(base),
                self.generic_params
                    .iter()
                    .map(|param| TypeSignature::GenericParamType(param.index))
                    .collect(),
            )
        }
    }

    /// Returns the signature of this type closed over `args`
    #[must_use]
    pub fn closed_signature(&self, args: &[TypeSignature]) -> TypeSignature {
        self.open_signature().substitute(args, &[])
    }
}

/// A parameter of a method
#[derive(Debug, Clone)]
pub struct ParameterSymbol {
    /// Declared name
    pub name: String,
    /// Zero based position
    pub index: usize,
    /// Declared type
    pub signature: TypeSignature,
    /// Attributes applied to the parameter
    pub attributes: Vec<AttributeData>,
    /// Parameter has a default value
    pub has_default: bool,
    /// Parameter is a `params` array
    pub is_params: bool,
}

/// A method definition
#[derive(Debug)]
pub struct MethodSymbol {
    /// Identity of this method
    pub token: Token,
    /// Type that declares the method
    pub declaring_type: Token,
    /// Declared name
    pub name: String,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Declaration modifiers
    pub modifiers: MethodModifiers,
    /// Declared return type
    pub return_type: TypeSignature,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterSymbol>,
    /// Declared generic parameters
    pub generic_params: Vec<GenericParam>,
    /// Attributes applied to the method
    pub attributes: Vec<AttributeData>,
    /// Declaration site
    pub location: Option<Location>,
}

impl MethodSymbol {
    /// Returns true for static methods
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true for abstract methods
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns true for instance constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.modifiers.contains(MethodModifiers::CONSTRUCTOR)
    }

    /// Returns true if the method declares generic parameters
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// The setter of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetterSymbol {
    /// Accessibility of the setter
    pub accessibility: Accessibility,
    /// Setter is declared with `init`
    pub init_only: bool,
}

/// A property definition
#[derive(Debug)]
pub struct PropertySymbol {
    /// Identity of this property
    pub token: Token,
    /// Type that declares the property
    pub declaring_type: Token,
    /// Declared name
    pub name: String,
    /// Declared type
    pub signature: TypeSignature,
    /// Accessibility of the getter, `None` for write-only properties
    pub getter: Option<Accessibility>,
    /// Setter, `None` for get-only properties
    pub setter: Option<SetterSymbol>,
    /// Property is static
    pub is_static: bool,
    /// Property is declared `required`
    pub is_required: bool,
    /// Attributes applied to the property
    pub attributes: Vec<AttributeData>,
    /// Declaration site
    pub location: Option<Location>,
}

impl PropertySymbol {
    /// Conventional name of the compiler generated backing field
    #[must_use]
    pub fn backing_field_name(&self) -> String {
        format!("<{}>k__BackingField", self.name)
    }
}

/// A field definition
#[derive(Debug)]
pub struct FieldSymbol {
    /// Identity of this field
    pub token: Token,
    /// Type that declares the field
    pub declaring_type: Token,
    /// Declared name
    pub name: String,
    /// Declared type
    pub signature: TypeSignature,
    /// Declared accessibility
    pub accessibility: Accessibility,
    /// Field is static
    pub is_static: bool,
}

/// A call to a framework API recorded while reading method bodies.
///
/// Only the receiver type and member name are kept; this is enough to flag reflection usage
/// without modelling expressions.
#[derive(Debug, Clone)]
pub struct InvocationSite {
    /// Type containing the call
    pub containing_type: Token,
    /// Method containing the call
    pub containing_method: Option<Token>,
    /// Fully qualified name of the receiver type, e.g. `System.Type`
    pub receiver: String,
    /// Invoked member, e.g. `GetMethod`
    pub member: String,
    /// Fully qualified receiver type of the first argument when statically known
    pub argument_type: Option<String>,
    /// Source position of the call
    pub location: Option<Location>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(modifiers: TypeModifiers, generic: usize) -> TypeSymbol {
        TypeSymbol {
            token: Token::from_parts(Token::TYPE_DEF, 1),
            namespace: "Demo".to_string(),
            name: "Fixture".to_string(),
            assembly: "Demo.Tests".to_string(),
            accessibility: Accessibility::Public,
            modifiers,
            declaring_type: None,
            base_type: None,
            interfaces: Vec::new(),
            generic_params: (0..generic)
                .map(|index| GenericParam {
                    name: format!("T{index}"),
                    index: index as u32,
                    constraints: Vec::new(),
                })
                .collect(),
            attributes: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            fields: Vec::new(),
            location: None,
        }
    }

    #[test]
    fn test_metadata_name() {
        assert_eq!(symbol(TypeModifiers::empty(), 0).metadata_name(), "Fixture");
        assert_eq!(symbol(TypeModifiers::empty(), 2).metadata_name(), "Fixture`2");
    }

    #[test]
    fn test_open_and_closed_signature() {
        let generic = symbol(TypeModifiers::empty(), 1);
        let open = generic.open_signature();
        assert!(open.contains_generic_param());

        let closed = generic.closed_signature(&[TypeSignature::I4]);
        assert_eq!(closed.generic_arguments(), &[TypeSignature::I4]);
        assert!(!closed.contains_generic_param());

        let plain = symbol(TypeModifiers::VALUE_TYPE, 0);
        assert_eq!(plain.open_signature(), TypeSignature::ValueType(plain.token));
    }

    #[test]
    fn test_abstractness() {
        assert!(symbol(TypeModifiers::ABSTRACT, 0).is_abstract());
        assert!(symbol(TypeModifiers::STATIC, 0).is_abstract());
        assert!(symbol(TypeModifiers::INTERFACE, 0).is_abstract());
        assert!(!symbol(TypeModifiers::SEALED, 0).is_abstract());
    }

    #[test]
    fn test_accessibility() {
        assert!(Accessibility::Internal.is_assembly_visible());
        assert!(Accessibility::ProtectedInternal.is_assembly_visible());
        assert!(!Accessibility::Protected.is_assembly_visible());
        assert_eq!(Accessibility::PrivateProtected.to_string(), "private protected");
    }
}
