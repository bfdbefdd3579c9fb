//! Type signatures of the program model.
//!
//! [`TypeSignature`] is the structural description of a type as it appears in a member
//! declaration: a primitive, a reference to a defined type, a generic instantiation, an
//! array, or one of the shapes that cannot be expressed in generated code (pointers,
//! by-refs, function pointers, typed references).
//!
//! Signatures are plain values. They implement [`Eq`] and [`Hash`] so they can be used as
//! identity keys, which is how generic instantiations and registry entries are deduplicated.
//! Rendering a signature to text needs the owning [`crate::model::ProgramModel`] because
//! class and value type references are stored as [`Token`]s.

use crate::model::Token;

/// The structural shape of a type used in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum TypeSignature {
    /// An unresolved or unknown type
    #[default]
    Unknown,
    /// `void`
    Void,
    /// `bool`
    Boolean,
    /// `char`
    Char,
    /// `sbyte`
    I1,
    /// `byte`
    U1,
    /// `short`
    I2,
    /// `ushort`
    U2,
    /// `int`
    I4,
    /// `uint`
    U4,
    /// `long`
    I8,
    /// `ulong`
    U8,
    /// `float`
    R4,
    /// `double`
    R8,
    /// `nint`
    I,
    /// `nuint`
    U,
    /// `string`
    String,
    /// `object`
    Object,
    /// A reference type defined in the program model
    Class(Token),
    /// A value type defined in the program model
    ValueType(Token),
    /// A closed or partially closed generic instantiation: definition plus arguments
    GenericInst(Box<TypeSignature>, Vec<TypeSignature>),
    /// A type parameter of the declaring type, by index
    GenericParamType(u32),
    /// A type parameter of the declaring method, by index
    GenericParamMethod(u32),
    /// A single dimensional, zero based array
    SzArray(Box<TypeSignature>),
    /// A multi dimensional array
    Array {
        /// Element type
        base: Box<TypeSignature>,
        /// Number of dimensions
        rank: u32,
    },
    /// An unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// A managed reference (`ref`, `out`, `in`)
    ByRef(Box<TypeSignature>),
    /// A function pointer, described by return type and parameters
    FnPtr(Box<TypeSignature>, Vec<TypeSignature>),
    /// `System.TypedReference`
    TypedByRef,
}

impl TypeSignature {
    /// Returns true for `void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSignature::Void)
    }

    /// Returns true for the built-in primitive types, including `string` and `object`
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.system_name().is_some()
    }

    /// Returns true for pointers, by-refs, function pointers and typed references
    ///
    /// None of these can be stored in an `object[]` argument array, so generated code can
    /// never bind them.
    #[must_use]
    pub fn is_unbindable(&self) -> bool {
        matches!(
            self,
            TypeSignature::Ptr(_)
                | TypeSignature::ByRef(_)
                | TypeSignature::FnPtr(..)
                | TypeSignature::TypedByRef
        )
    }

    /// Returns the defining token for class, value type and generic instantiation signatures
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self {
            TypeSignature::Class(token) | TypeSignature::ValueType(token) => Some(*token),
            TypeSignature::GenericInst(base, _) => base.token(),
            _ => None,
        }
    }

    /// Returns the type arguments of a generic instantiation, or an empty slice
    #[must_use]
    pub fn generic_arguments(&self) -> &[TypeSignature] {
        match self {
            TypeSignature::GenericInst(_, args) => args,
            _ => &[],
        }
    }

    /// Returns true if any type or method type parameter occurs anywhere in the signature
    #[must_use]
    pub fn contains_generic_param(&self) -> bool {
        match self {
            TypeSignature::GenericParamType(_) | TypeSignature::GenericParamMethod(_) => true,
            TypeSignature::GenericInst(base, args) => {
                base.contains_generic_param() || args.iter().any(Self::contains_generic_param)
            }
            TypeSignature::SzArray(inner)
            | TypeSignature::Array { base: inner, .. }
            | TypeSignature::Ptr(inner)
            | TypeSignature::ByRef(inner) => inner.contains_generic_param(),
            TypeSignature::FnPtr(ret, params) => {
                ret.contains_generic_param() || params.iter().any(Self::contains_generic_param)
            }
            _ => false,
        }
    }

    /// Returns the nesting depth of generic instantiations inside this signature.
    ///
    /// `int` has depth 0, `List<int>` depth 1, `List<Dictionary<int, List<int>>>` depth 3.
    /// Arrays are transparent.
    #[must_use]
    pub fn generic_depth(&self) -> usize {
        match self {
            TypeSignature::GenericInst(_, args) => {
                1 + args.iter().map(Self::generic_depth).max().unwrap_or(0)
            }
            TypeSignature::SzArray(inner)
            | TypeSignature::Array { base: inner, .. }
            | TypeSignature::Ptr(inner)
            | TypeSignature::ByRef(inner) => inner.generic_depth(),
            _ => 0,
        }
    }

    /// Replaces type and method type parameters with the given arguments.
    ///
    /// Parameters without a corresponding argument are left untouched, which allows partial
    /// substitution (closing the type parameters while a method stays generic).
    #[must_use]
    pub fn substitute(
        &self,
        type_args: &[TypeSignature],
        method_args: &[TypeSignature],
    ) -> TypeSignature {
        match self {
            TypeSignature::GenericParamType(index) => type_args
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSignature::GenericParamMethod(index) => method_args
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSignature::GenericInst(base, args) => TypeSignature::GenericInst(
                Box::new(base.substitute(type_args, method_args)),
                args.iter()
                    .map(|arg| arg.substitute(type_args, method_args))
                    .collect(),
            ),
            TypeSignature::SzArray(inner) => {
                TypeSignature::SzArray(Box::new(inner.substitute(type_args, method_args)))
            }
            TypeSignature::Array { base, rank } => TypeSignature::Array {
                base: Box::new(base.substitute(type_args, method_args)),
                rank: *rank,
            },
            TypeSignature::Ptr(inner) => {
                TypeSignature::Ptr(Box::new(inner.substitute(type_args, method_args)))
            }
            TypeSignature::ByRef(inner) => {
                TypeSignature::ByRef(Box::new(inner.substitute(type_args, method_args)))
            }
            TypeSignature::FnPtr(ret, params) => TypeSignature::FnPtr(
                Box::new(ret.substitute(type_args, method_args)),
                params
                    .iter()
                    .map(|param| param.substitute(type_args, method_args))
                    .collect(),
            ),
            _ => self.clone(),
        }
    }

    /// Returns the `System.*` name of a primitive signature
    #[must_use]
    pub fn system_name(&self) -> Option<&'static str> {
        Some(match self {
            TypeSignature::Void => "System.Void",
            TypeSignature::Boolean => "System.Boolean",
            TypeSignature::Char => "System.Char",
            TypeSignature::I1 => "System.SByte",
            TypeSignature::U1 => "System.Byte",
            TypeSignature::I2 => "System.Int16",
            TypeSignature::U2 => "System.UInt16",
            TypeSignature::I4 => "System.Int32",
            TypeSignature::U4 => "System.UInt32",
            TypeSignature::I8 => "System.Int64",
            TypeSignature::U8 => "System.UInt64",
            TypeSignature::R4 => "System.Single",
            TypeSignature::R8 => "System.Double",
            TypeSignature::I => "System.IntPtr",
            TypeSignature::U => "System.UIntPtr",
            TypeSignature::String => "System.String",
            TypeSignature::Object => "System.Object",
            _ => return None,
        })
    }

    /// Returns the C# keyword of a primitive signature
    #[must_use]
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            TypeSignature::Void => "void",
            TypeSignature::Boolean => "bool",
            TypeSignature::Char => "char",
            TypeSignature::I1 => "sbyte",
            TypeSignature::U1 => "byte",
            TypeSignature::I2 => "short",
            TypeSignature::U2 => "ushort",
            TypeSignature::I4 => "int",
            TypeSignature::U4 => "uint",
            TypeSignature::I8 => "long",
            TypeSignature::U8 => "ulong",
            TypeSignature::R4 => "float",
            TypeSignature::R8 => "double",
            TypeSignature::I => "nint",
            TypeSignature::U => "nuint",
            TypeSignature::String => "string",
            TypeSignature::Object => "object",
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(arg: TypeSignature) -> TypeSignature {
        TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(Token::from_parts(Token::TYPE_DEF, 9))),
            vec![arg],
        )
    }

    #[test]
    fn test_contains_generic_param() {
        assert!(!TypeSignature::I4.contains_generic_param());
        assert!(TypeSignature::GenericParamType(0).contains_generic_param());
        assert!(list_of(TypeSignature::GenericParamMethod(0)).contains_generic_param());
        assert!(TypeSignature::SzArray(Box::new(list_of(TypeSignature::GenericParamType(1))))
            .contains_generic_param());
        assert!(!list_of(TypeSignature::String).contains_generic_param());
    }

    #[test]
    fn test_generic_depth() {
        assert_eq!(TypeSignature::I4.generic_depth(), 0);
        assert_eq!(list_of(TypeSignature::I4).generic_depth(), 1);
        assert_eq!(list_of(list_of(list_of(TypeSignature::I4))).generic_depth(), 3);
        assert_eq!(
            TypeSignature::SzArray(Box::new(list_of(TypeSignature::I4))).generic_depth(),
            1
        );
    }

    #[test]
    fn test_substitute() {
        let open = list_of(TypeSignature::SzArray(Box::new(
            TypeSignature::GenericParamType(0),
        )));
        let closed = open.substitute(&[TypeSignature::String], &[]);
        assert_eq!(
            closed,
            list_of(TypeSignature::SzArray(Box::new(TypeSignature::String)))
        );
        assert!(!closed.contains_generic_param());
    }

    #[test]
    fn test_substitute_partial() {
        let sig = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(Token::from_parts(Token::TYPE_DEF, 3))),
            vec![
                TypeSignature::GenericParamType(0),
                TypeSignature::GenericParamMethod(0),
            ],
        );
        let partial = sig.substitute(&[TypeSignature::I8], &[]);
        assert_eq!(
            partial.generic_arguments(),
            &[TypeSignature::I8, TypeSignature::GenericParamMethod(0)]
        );
        assert!(partial.contains_generic_param());
    }

    #[test]
    fn test_unbindable() {
        assert!(TypeSignature::Ptr(Box::new(TypeSignature::I4)).is_unbindable());
        assert!(TypeSignature::ByRef(Box::new(TypeSignature::I4)).is_unbindable());
        assert!(TypeSignature::TypedByRef.is_unbindable());
        assert!(!TypeSignature::String.is_unbindable());
    }

    #[test]
    fn test_primitive_names() {
        assert_eq!(TypeSignature::I4.system_name(), Some("System.Int32"));
        assert_eq!(TypeSignature::I4.keyword(), Some("int"));
        assert_eq!(TypeSignature::Class(Token(0x02000001)).system_name(), None);
        assert!(TypeSignature::Object.is_primitive());
    }
}
