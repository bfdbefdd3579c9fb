//! Shared fixtures for unit tests.
//!
//! [`attributes`] hands out ready-made framework attribute applications bound to the
//! well-known tokens of a [`ProgramBuilder`], and [`fixtures`] builds a few small programs
//! that several modules exercise.

pub mod fixtures;

use crate::{
    analysis::HookScope,
    model::{AttributeArgument, AttributeData, ProgramBuilder, TypeSignature, WellKnown},
};

/// Factory for framework attribute applications
pub struct Attributes {
    wk: WellKnown,
}

/// Returns an attribute factory for the program being built
pub fn attributes(program: &ProgramBuilder) -> Attributes {
    Attributes {
        wk: program.well_known().clone(),
    }
}

impl Attributes {
    /// `[Test]`
    pub fn test(&self) -> AttributeData {
        AttributeData::new(self.wk.test)
    }

    /// `[Before(scope)]`
    pub fn before(&self, scope: HookScope) -> AttributeData {
        self.hook(self.wk.before, scope)
    }

    /// `[After(scope)]`
    pub fn after(&self, scope: HookScope) -> AttributeData {
        self.hook(self.wk.after, scope)
    }

    /// `[BeforeEvery(scope)]`
    pub fn before_every(&self, scope: HookScope) -> AttributeData {
        self.hook(self.wk.before_every, scope)
    }

    /// `[AfterEvery(scope)]`
    pub fn after_every(&self, scope: HookScope) -> AttributeData {
        self.hook(self.wk.after_every, scope)
    }

    /// `[Arguments(values..)]`
    pub fn arguments(&self, values: Vec<AttributeArgument>) -> AttributeData {
        values
            .into_iter()
            .fold(AttributeData::new(self.wk.arguments), AttributeData::arg)
    }

    /// `[Matrix(values..)]` on a parameter
    pub fn matrix(&self, values: Vec<AttributeArgument>) -> AttributeData {
        values
            .into_iter()
            .fold(AttributeData::new(self.wk.matrix), AttributeData::arg)
    }

    /// `[MethodDataSource(nameof(member))]`
    pub fn method_data_source(&self, member: &str) -> AttributeData {
        AttributeData::new(self.wk.method_data_source)
            .arg(AttributeArgument::String(member.to_string()))
    }

    /// `[MethodDataSource(typeof(class), nameof(member))]`
    pub fn method_data_source_on(&self, class: TypeSignature, member: &str) -> AttributeData {
        AttributeData::new(self.wk.method_data_source)
            .arg(AttributeArgument::Type(class))
            .arg(AttributeArgument::String(member.to_string()))
    }

    /// `[ClassDataSource<T..>]`
    pub fn class_data_source(&self, types: Vec<TypeSignature>) -> AttributeData {
        types
            .into_iter()
            .fold(AttributeData::new(self.wk.class_data_source), AttributeData::type_arg)
    }

    /// `[DependsOn(values..)]`
    pub fn depends_on(&self, values: Vec<AttributeArgument>) -> AttributeData {
        values
            .into_iter()
            .fold(AttributeData::new(self.wk.depends_on), AttributeData::arg)
    }

    /// `[Skip(reason)]`
    pub fn skip(&self, reason: &str) -> AttributeData {
        AttributeData::new(self.wk.skip).arg(AttributeArgument::String(reason.to_string()))
    }

    /// `[Category(name)]`
    pub fn category(&self, name: &str) -> AttributeData {
        AttributeData::new(self.wk.category).arg(AttributeArgument::String(name.to_string()))
    }

    /// `[Timeout(ms)]`
    pub fn timeout(&self, milliseconds: i32) -> AttributeData {
        AttributeData::new(self.wk.timeout).arg(AttributeArgument::I4(milliseconds))
    }

    /// `[Retry(count)]`
    pub fn retry(&self, count: i32) -> AttributeData {
        AttributeData::new(self.wk.retry).arg(AttributeArgument::I4(count))
    }

    /// `[NotInParallel]`
    pub fn not_in_parallel(&self) -> AttributeData {
        AttributeData::new(self.wk.not_in_parallel)
    }

    /// `[GenerateGenericTest(typeof(..)..)]`
    pub fn generate_generic_test(&self, types: Vec<TypeSignature>) -> AttributeData {
        types.into_iter().fold(
            AttributeData::new(self.wk.generate_generic_test),
            |attribute, sig| attribute.arg(AttributeArgument::Type(sig)),
        )
    }

    /// `[InheritsTests]`
    pub fn inherits_tests(&self) -> AttributeData {
        AttributeData::new(self.wk.inherits_tests)
    }

    fn hook(&self, attribute: crate::model::Token, scope: HookScope) -> AttributeData {
        let value = match scope {
            HookScope::Test => 0,
            HookScope::Class => 1,
            HookScope::Assembly => 2,
            HookScope::TestSession => 3,
            HookScope::TestDiscovery => 4,
        };
        AttributeData::new(attribute).arg(AttributeArgument::Enum(
            TypeSignature::ValueType(self.wk.hook_type),
            value,
        ))
    }
}
