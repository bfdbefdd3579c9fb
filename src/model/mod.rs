//! The program model reader.
//!
//! Everything the generator knows about the compilation it processes flows through this
//! module: symbols ([`TypeSymbol`], [`MethodSymbol`], [`PropertySymbol`], ...), their
//! signatures ([`TypeSignature`]) and attributes ([`AttributeData`]), held in a queryable
//! [`ProgramModel`].
//!
//! # Key Components
//!
//! - [`ProgramModel`] - Concurrent symbol storage plus structural queries
//! - [`ProgramBuilder`] - Fluent population of a model
//! - [`TypeSignature`] - Structural type descriptions with substitution support
//! - [`WellKnown`] - Tokens of system and framework types every model contains
//! - [`Token`] - Symbol identity
//!
//! # Thread Safety
//!
//! [`ProgramModel`] is [`Send`] and [`Sync`]. Population happens through `&self` on lock-free
//! containers; once handed to the generator the model is only read.

mod attributes;
mod builder;
mod program;
mod signature;
mod symbols;
mod token;
mod wellknown;

pub use attributes::{AttributeArgument, AttributeData, NamedArgument};
pub use builder::{FieldBuilder, MethodBuilder, ProgramBuilder, PropertyBuilder, TypeBuilder};
pub use program::{ProgramModel, TypeNameStyle};
pub use signature::TypeSignature;
pub use symbols::{
    Accessibility, FieldRc, FieldSymbol, GenericConstraint, GenericParam, InvocationSite,
    Location, MethodModifiers, MethodRc, MethodSymbol, ParameterSymbol, PropertyRc,
    PropertySymbol, SetterSymbol, TypeModifiers, TypeRc, TypeSymbol,
};
pub use token::Token;
pub use wellknown::{WellKnown, FRAMEWORK_ASSEMBLY, FRAMEWORK_NAMESPACE, SYSTEM_ASSEMBLY};
