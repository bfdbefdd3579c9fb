//! Properties that must hold for any input.
//!
//! These tests exercise the guarantees callers rely on: open generics never reach generated
//! code, hook ordering is stable across the base chain, tuple paths reach every element,
//! registration is idempotent and strategy selection is a pure function of its inputs.

use testscope::{
    analysis::{
        choose_strategy, DataSourceAnalyzer, GenericInstantiationResolver, NestedTuples,
        PropertyShape, TupleAccess, TupleLayout, DIRECT_ITEMS,
    },
    model::GenericConstraint,
    prelude::*,
    Result,
};

fn test_hook(program: &ProgramBuilder) -> AttributeData {
    let wk = program.well_known();
    AttributeData::new(wk.before).arg(AttributeArgument::Enum(
        TypeSignature::ValueType(wk.hook_type),
        0,
    ))
}

/// Open generic classes and methods without a concrete instantiation produce no record
#[test]
fn test_open_generics_never_emitted() -> Result<()> {
    let program = ProgramBuilder::new("Demo.Tests");
    let wk = program.well_known().clone();
    program
        .class("Demo", "Open")
        .generic_param("T")
        .method(
            MethodBuilder::new("UsesT")
                .param("value", TypeSignature::GenericParamType(0))
                .attribute(AttributeData::new(wk.test)),
        )
        .build()?;
    program
        .class("Demo", "Closed")
        .method(
            MethodBuilder::new("Echo")
                .generic_param("T")
                .param("value", TypeSignature::GenericParamMethod(0))
                .attribute(AttributeData::new(wk.test)),
        )
        .method(MethodBuilder::new("Plain").attribute(AttributeData::new(wk.test)))
        .build()?;
    let model = program.finish();

    let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
    assert_eq!(output.records.len(), 1);
    assert_eq!(output.records[0].method_name, "Plain");
    for record in &output.records {
        assert!(record
            .parameter_types
            .iter()
            .all(|sig| !sig.contains_generic_param()));
    }
    Ok(())
}

/// A single-type source cannot close a method with two type parameters
#[test]
fn test_arity_mismatch_dropped() -> Result<()> {
    let program = ProgramBuilder::new("Demo.Tests");
    let wk = program.well_known().clone();
    let ints = program.enumerable_of(TypeSignature::I4);
    let fixture = program
        .class("Demo", "Pairs")
        .method(MethodBuilder::new("Source").as_static().returns(ints))
        .method(
            MethodBuilder::new("Pair")
                .generic_param("T1")
                .generic_param("T2")
                .param("a", TypeSignature::GenericParamMethod(0))
                .param("b", TypeSignature::GenericParamMethod(1))
                .attribute(AttributeData::new(wk.test))
                .attribute(
                    AttributeData::new(wk.method_data_source)
                        .arg(AttributeArgument::String("Source".to_string())),
                ),
        )
        .build()?;
    let model = program.finish();

    let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
    let resolver = GenericInstantiationResolver::new(&model, &datasources, "Demo.Tests", 5);
    let method = model.find_method(fixture, "Pair").unwrap();
    for instantiation in resolver.resolve_method(&method, &TypeSignature::Class(fixture)) {
        assert_eq!(instantiation.arguments.len(), 2);
    }

    let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
    assert!(output.records.is_empty());
    assert!(output.failures.is_empty());
    Ok(())
}

/// An explicit instantiation that violates a constraint is dropped without a diagnostic
#[test]
fn test_explicit_constraint_violation_dropped() -> Result<()> {
    let program = ProgramBuilder::new("Demo.Tests");
    let wk = program.well_known().clone();
    program
        .class("Demo", "Structs")
        .constrained_generic_param("T", vec![GenericConstraint::ValueType])
        .attribute(
            AttributeData::new(wk.generate_generic_test)
                .arg(AttributeArgument::Type(TypeSignature::String)),
        )
        .attribute(
            AttributeData::new(wk.generate_generic_test)
                .arg(AttributeArgument::Type(TypeSignature::I4)),
        )
        .method(MethodBuilder::new("Runs").attribute(AttributeData::new(wk.test)))
        .build()?;
    let model = program.finish();

    let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
    assert_eq!(output.records.len(), 1);
    assert_eq!(
        output.records[0].class.generic_arguments(),
        &[TypeSignature::I4][..]
    );
    assert!(output.failures.is_empty());
    assert!(!output.diagnostics.has_any());
    Ok(())
}

/// Hooks of equal order run base first, then in declaration order
#[test]
fn test_hook_order_is_stable() -> Result<()> {
    let program = ProgramBuilder::new("Demo.Tests");
    let base = program
        .class("Demo", "Base")
        .modifiers(TypeModifiers::ABSTRACT)
        .method(MethodBuilder::new("BaseFirst").attribute(test_hook(&program)))
        .method(MethodBuilder::new("BaseSecond").attribute(test_hook(&program)))
        .build()?;
    program
        .class("Demo", "Derived")
        .extends(TypeSignature::Class(base))
        .method(MethodBuilder::new("DerivedFirst").attribute(test_hook(&program)))
        .method(
            MethodBuilder::new("DerivedEarly")
                .attribute(test_hook(&program).named("Order", AttributeArgument::I4(-1))),
        )
        .method(MethodBuilder::new("Runs").attribute(AttributeData::new(program.well_known().test)))
        .build()?;
    let model = program.finish();

    let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
    assert_eq!(output.records.len(), 1);
    let names: Vec<&str> = output.records[0]
        .hooks
        .before_test
        .iter()
        .map(|hook| hook.method_name.as_str())
        .collect();
    assert_eq!(
        names,
        vec!["DerivedEarly", "BaseFirst", "BaseSecond", "DerivedFirst"]
    );
    Ok(())
}

/// Every element of a long tuple is reachable through `ItemN` reads and the `Rest` chain
#[test]
fn test_tuple_paths_reach_every_element() {
    let program = ProgramBuilder::new("Demo.Tests");
    let elements: Vec<TypeSignature> = (0..15)
        .map(|index| {
            if index % 2 == 0 {
                TypeSignature::I4
            } else {
                TypeSignature::String
            }
        })
        .collect();
    let tuple = program.tuple(elements.clone());
    let model = program.finish();

    let layout = TupleLayout::of(&model, &tuple, NestedTuples::Flatten).unwrap();
    assert_eq!(layout.arity(), elements.len());
    assert_eq!(layout.element_types(), elements);

    for (index, element) in layout.elements.iter().enumerate() {
        let rests = index / DIRECT_ITEMS;
        let item = (index % DIRECT_ITEMS) as u8 + 1;
        assert_eq!(element.path.len(), rests + 1);
        assert!(element.path[..rests]
            .iter()
            .all(|step| *step == TupleAccess::Rest));
        assert_eq!(element.path[rests], TupleAccess::Item(item));
    }
    assert_eq!(layout.elements[14].access_expression("t"), "t.Rest.Rest.Item1");
}

/// Registering the same key twice keeps one entry holding the latest record
#[test]
fn test_registration_is_idempotent() -> Result<()> {
    let program = ProgramBuilder::new("Demo.Tests");
    let test = AttributeData::new(program.well_known().test);
    program
        .class("Demo", "Calculator")
        .method(MethodBuilder::new("Adds").attribute(test))
        .build()?;
    let model = program.finish();
    let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
    let record = output.records[0].clone();

    let registry = MetadataRegistry::new();
    assert!(registry.register(record.key.clone(), record.clone()).is_none());

    let mut renamed = (*record).clone();
    renamed.policy.display_name = Some("Second".to_string());
    let previous = registry.register(record.key.clone(), renamed).unwrap();
    assert!(std::sync::Arc::ptr_eq(&previous, &record));
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.get(&record.key).unwrap().policy.display_name.as_deref(),
        Some("Second")
    );
    Ok(())
}

/// Strategy selection depends only on the shape of the property
#[test]
fn test_strategy_selection_is_pure() {
    let accessibilities = [
        None,
        Some(Accessibility::Public),
        Some(Accessibility::Internal),
        Some(Accessibility::Protected),
        Some(Accessibility::Private),
    ];
    for setter in accessibilities {
        for init_only in [false, true] {
            for backing_field in [false, true] {
                let shape = PropertyShape {
                    setter,
                    init_only,
                    backing_field,
                };
                let strategy = choose_strategy(shape);
                assert_eq!(strategy, choose_strategy(shape));

                let expected = match setter {
                    None => InjectionStrategy::Unsupported,
                    Some(_) if init_only => InjectionStrategy::InitOnlyAccessor,
                    Some(Accessibility::Public) => InjectionStrategy::DirectSetter,
                    Some(_) if backing_field => InjectionStrategy::BackingFieldAccess,
                    Some(_) => InjectionStrategy::ReflectionFallback,
                };
                assert_eq!(strategy, expected);
            }
        }
    }
}
