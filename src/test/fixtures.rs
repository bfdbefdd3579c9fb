//! Small programs covering the main generation scenarios.

use std::sync::Arc;

use crate::{
    model::{
        Accessibility, AttributeArgument, MethodBuilder, ProgramBuilder, ProgramModel,
        PropertyBuilder, TypeModifiers, TypeSignature,
    },
    test::attributes,
};

/// `Demo.Calculator` with one parameterless test `Adds`
pub fn plain_test() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    program
        .class("Demo", "Calculator")
        .method(MethodBuilder::new("Adds").attribute(attrs.test()))
        .build()
        .unwrap();
    program.finish()
}

/// `Demo.Rows.Checks(int)` with the literal rows `1` and `2`
pub fn literal_rows() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    program
        .class("Demo", "Rows")
        .method(
            MethodBuilder::new("Checks")
                .param("value", TypeSignature::I4)
                .attribute(attrs.test())
                .attribute(attrs.arguments(vec![AttributeArgument::I4(1)]))
                .attribute(attrs.arguments(vec![AttributeArgument::I4(2)])),
        )
        .build()
        .unwrap();
    program.finish()
}

/// Abstract generic `Demo.Base<T>` declaring `Works(T)`, closed by `Demo.IntTests : Base<int>`
/// and fed by a static source on the base
pub fn generic_inheritance() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    let sequence = program.enumerable_of(TypeSignature::GenericParamType(0));
    let base = program
        .class("Demo", "Base")
        .modifiers(TypeModifiers::ABSTRACT)
        .generic_param("T")
        .method(MethodBuilder::new("Values").as_static().returns(sequence))
        .method(
            MethodBuilder::new("Works")
                .param("value", TypeSignature::GenericParamType(0))
                .attribute(attrs.test())
                .attribute(attrs.method_data_source("Values")),
        )
        .build()
        .unwrap();
    program
        .class("Demo", "IntTests")
        .extends(TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(base)),
            vec![TypeSignature::I4],
        ))
        .build()
        .unwrap();
    program.finish()
}

/// `Demo.Tuples.Spreads(int, string, bool)` fed by `IEnumerable<(int, string, bool)>`
pub fn tuple_source() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    let tuple = program.tuple(vec![
        TypeSignature::I4,
        TypeSignature::String,
        TypeSignature::Boolean,
    ]);
    let rows = program.enumerable_of(tuple);
    program
        .class("Demo", "Tuples")
        .method(MethodBuilder::new("Rows").as_static().returns(rows))
        .method(
            MethodBuilder::new("Spreads")
                .param("number", TypeSignature::I4)
                .param("text", TypeSignature::String)
                .param("flag", TypeSignature::Boolean)
                .attribute(attrs.test())
                .attribute(attrs.method_data_source("Rows")),
        )
        .build()
        .unwrap();
    program.finish()
}

/// `Demo.Streams.Reads(int)` fed by `IAsyncEnumerable<int> Numbers()`
pub fn async_source() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    let numbers = program.async_enumerable_of(TypeSignature::I4);
    program
        .class("Demo", "Streams")
        .method(MethodBuilder::new("Numbers").as_static().returns(numbers))
        .method(
            MethodBuilder::new("Reads")
                .param("value", TypeSignature::I4)
                .attribute(attrs.test())
                .attribute(attrs.method_data_source("Numbers")),
        )
        .build()
        .unwrap();
    program.finish()
}

/// `Demo.Configured` with an `init` property `Name` fed by a static source
pub fn init_only_injection() -> Arc<ProgramModel> {
    let program = ProgramBuilder::new("Demo.Tests");
    let attrs = attributes(&program);
    program
        .class("Demo", "Configured")
        .method(MethodBuilder::new("Names").as_static().returns(TypeSignature::String))
        .property(
            PropertyBuilder::new("Name", TypeSignature::String)
                .init(Accessibility::Public)
                .auto()
                .required()
                .attribute(attrs.method_data_source("Names")),
        )
        .method(MethodBuilder::new("Uses").attribute(attrs.test()))
        .build()
        .unwrap();
    program.finish()
}
