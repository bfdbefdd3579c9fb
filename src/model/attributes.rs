//! Attribute applications.
//!
//! An [`AttributeData`] is one attribute applied to a type, member or parameter: the
//! attribute class, optional generic arguments of the attribute class, the constructor
//! arguments and the named (property or field) arguments. Values are already decoded into
//! [`AttributeArgument`]; the generator never looks at raw blobs.

use crate::model::{Location, Token, TypeSignature};

/// A decoded attribute argument value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArgument {
    /// `null`
    Null,
    /// A boolean value
    Bool(bool),
    /// A character value
    Char(char),
    /// A signed 8-bit integer
    I1(i8),
    /// An unsigned 8-bit integer
    U1(u8),
    /// A signed 16-bit integer
    I2(i16),
    /// An unsigned 16-bit integer
    U2(u16),
    /// A signed 32-bit integer
    I4(i32),
    /// An unsigned 32-bit integer
    U4(u32),
    /// A signed 64-bit integer
    I8(i64),
    /// An unsigned 64-bit integer
    U8(u64),
    /// A 32-bit floating point value
    R4(f32),
    /// A 64-bit floating point value
    R8(f64),
    /// A string value
    String(String),
    /// A `typeof(..)` value
    Type(TypeSignature),
    /// An array of values with its declared element type
    Array(TypeSignature, Vec<AttributeArgument>),
    /// An enum value: enum type and underlying value
    Enum(TypeSignature, i64),
}

impl AttributeArgument {
    /// Returns the static type of the value.
    ///
    /// `null` has no type, and `typeof(..)` values are typed by `System.Type`, which lives in
    /// the program model; both return `None`.
    #[must_use]
    pub fn static_type(&self) -> Option<TypeSignature> {
        Some(match self {
            AttributeArgument::Null | AttributeArgument::Type(_) => return None,
            AttributeArgument::Bool(_) => TypeSignature::Boolean,
            AttributeArgument::Char(_) => TypeSignature::Char,
            AttributeArgument::I1(_) => TypeSignature::I1,
            AttributeArgument::U1(_) => TypeSignature::U1,
            AttributeArgument::I2(_) => TypeSignature::I2,
            AttributeArgument::U2(_) => TypeSignature::U2,
            AttributeArgument::I4(_) => TypeSignature::I4,
            AttributeArgument::U4(_) => TypeSignature::U4,
            AttributeArgument::I8(_) => TypeSignature::I8,
            AttributeArgument::U8(_) => TypeSignature::U8,
            AttributeArgument::R4(_) => TypeSignature::R4,
            AttributeArgument::R8(_) => TypeSignature::R8,
            AttributeArgument::String(_) => TypeSignature::String,
            AttributeArgument::Array(element, _) => {
                TypeSignature::SzArray(Box::new(element.clone()))
            }
            AttributeArgument::Enum(enum_type, _) => enum_type.clone(),
        })
    }

    /// Returns the string payload
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeArgument::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integer payload of integral and enum values
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        Some(match self {
            AttributeArgument::I1(v) => i64::from(*v),
            AttributeArgument::U1(v) => i64::from(*v),
            AttributeArgument::I2(v) => i64::from(*v),
            AttributeArgument::U2(v) => i64::from(*v),
            AttributeArgument::I4(v) => i64::from(*v),
            AttributeArgument::U4(v) => i64::from(*v),
            AttributeArgument::I8(v) => *v,
            AttributeArgument::Enum(_, v) => *v,
            _ => return None,
        })
    }

    /// Returns the boolean payload
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeArgument::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the signature of a `typeof(..)` value
    #[must_use]
    pub fn as_type(&self) -> Option<&TypeSignature> {
        match self {
            AttributeArgument::Type(sig) => Some(sig),
            _ => None,
        }
    }
}

/// A named argument of an attribute application (`Order = 3`)
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArgument {
    /// Name of the property or field
    pub name: String,
    /// Assigned value
    pub value: AttributeArgument,
}

/// One attribute applied to a symbol
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeData {
    /// The attribute class
    pub attribute_type: Token,
    /// Generic arguments of the attribute class, e.g. `ClassDataSource<Db>`
    pub type_arguments: Vec<TypeSignature>,
    /// Constructor arguments
    pub fixed_args: Vec<AttributeArgument>,
    /// Named arguments
    pub named_args: Vec<NamedArgument>,
    /// Application site
    pub location: Option<Location>,
}

impl AttributeData {
    /// Creates an attribute application without arguments
    #[must_use]
    pub fn new(attribute_type: Token) -> Self {
        AttributeData {
            attribute_type,
            type_arguments: Vec::new(),
            fixed_args: Vec::new(),
            named_args: Vec::new(),
            location: None,
        }
    }

    /// Appends a constructor argument
    #[must_use]
    pub fn arg(mut self, value: AttributeArgument) -> Self {
        self.fixed_args.push(value);
        self
    }

    /// Appends a named argument
    #[must_use]
    pub fn named(mut self, name: &str, value: AttributeArgument) -> Self {
        self.named_args.push(NamedArgument {
            name: name.to_string(),
            value,
        });
        self
    }

    /// Appends a generic argument of the attribute class
    #[must_use]
    pub fn type_arg(mut self, sig: TypeSignature) -> Self {
        self.type_arguments.push(sig);
        self
    }

    /// Sets the application site
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Looks up a named argument
    #[must_use]
    pub fn named_arg(&self, name: &str) -> Option<&AttributeArgument> {
        self.named_args
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }
}
