//! Property injection code.
//!
//! Emission only reads the [`InjectionStrategy`] chosen during analysis:
//!
//! - `DirectSetter` assigns through the public setter
//! - `InitOnlyAccessor` writes the backing field through an `UnsafeAccessor` on .NET 8 and
//!   later, reflectively otherwise. Owners that are generic instantiations get one generic
//!   accessor class per (generic type, property), which needs .NET 9
//! - `BackingFieldAccess` writes the located backing field through an `UnsafeAccessor`
//! - `ReflectionFallback` calls `PropertyInfo.SetValue`, the only path that is not trim safe

use std::collections::HashSet;

use crate::{
    analysis::{
        safe_identifier, DataSourceProducer, InjectionStrategy, PropertyInjectionDescriptor,
        WRAPPER_CLASS,
    },
    codegen::{
        literals::render_literal,
        writer::{string_literal, CodeWriter},
    },
    config::GeneratorOptions,
    model::{ProgramModel, Token, TypeNameStyle},
};

const UNSAFE_ACCESSOR: &str = "[global::System.Runtime.CompilerServices.UnsafeAccessor(global::System.Runtime.CompilerServices.UnsafeAccessorKind.Field, Name = {})]";
const INSTANCE_FLAGS: &str = "global::System.Reflection.BindingFlags.Instance | global::System.Reflection.BindingFlags.Public | global::System.Reflection.BindingFlags.NonPublic";

/// Writes accessors and injector methods for resolved property injections
pub struct InjectionEmitter<'a> {
    model: &'a ProgramModel,
    options: &'a GeneratorOptions,
}

impl<'a> InjectionEmitter<'a> {
    /// Creates an emitter
    #[must_use]
    pub fn new(model: &'a ProgramModel, options: &'a GeneratorOptions) -> Self {
        InjectionEmitter { model, options }
    }

    /// Writes `UnsafeAccessor` members for non-generic owners into the current class
    pub fn emit_accessors(
        &self,
        writer: &mut CodeWriter,
        injections: &[PropertyInjectionDescriptor],
    ) {
        let mut emitted = HashSet::new();
        let accessors: Vec<&PropertyInjectionDescriptor> = flatten(injections)
            .into_iter()
            .filter(|injection| injection.generic_context.is_none())
            .filter(|injection| {
                matches!(
                    injection.strategy,
                    InjectionStrategy::InitOnlyAccessor | InjectionStrategy::BackingFieldAccess
                )
            })
            .filter(|injection| emitted.insert(self.accessor_name(injection)))
            .collect();
        if accessors.is_empty() {
            return;
        }

        writer.line("#if NET8_0_OR_GREATER");
        for injection in accessors {
            let field = injection
                .backing_field
                .clone()
                .unwrap_or_else(|| format!("<{}>k__BackingField", injection.name));
            writer.line(UNSAFE_ACCESSOR.replace("{}", &string_literal(&field)));
            writer.line(format!(
                "private static extern ref {} {}({} instance);",
                self.model.type_name(&injection.property_type, TypeNameStyle::Code),
                self.accessor_name(injection),
                self.model.type_name(&injection.declaring_type, TypeNameStyle::Code),
            ));
        }
        writer.line("#endif");
    }

    /// Writes one generic accessor class per (generic type, property) at namespace level
    pub fn emit_generic_accessors(
        &self,
        writer: &mut CodeWriter,
        injections: &[PropertyInjectionDescriptor],
    ) {
        let mut emitted = HashSet::new();
        let generic: Vec<(&PropertyInjectionDescriptor, Token)> = flatten(injections)
            .into_iter()
            .filter_map(|injection| {
                let context = injection.generic_context.as_ref()?;
                matches!(
                    injection.strategy,
                    InjectionStrategy::InitOnlyAccessor | InjectionStrategy::BackingFieldAccess
                )
                .then_some((injection, context.definition))
            })
            .filter(|(injection, definition)| emitted.insert((*definition, injection.name.clone())))
            .collect();
        if generic.is_empty() {
            return;
        }

        writer.line("#if NET9_0_OR_GREATER");
        for (injection, definition) in generic {
            let Some(symbol) = self.model.get_type(definition) else {
                continue;
            };
            let Some(property) = self.model.get_property(injection.property) else {
                continue;
            };
            let params = &symbol.generic_params;
            let names: Vec<&str> = params.iter().map(|param| param.name.as_str()).collect();
            let owner = self
                .model
                .type_name_in(&symbol.open_signature(), TypeNameStyle::Code, params, &[]);
            let value = self
                .model
                .type_name_in(&property.signature, TypeNameStyle::Code, params, &[]);
            let field = injection
                .backing_field
                .clone()
                .unwrap_or_else(|| property.backing_field_name());

            writer.open(format!(
                "internal static class {}<{}>",
                self.generic_accessor_class(definition, &injection.name),
                names.join(", ")
            ));
            writer.line(UNSAFE_ACCESSOR.replace("{}", &string_literal(&field)));
            writer.line(format!("public static extern ref {value} Field({owner} instance);"));
            writer.close();
        }
        writer.line("#endif");
    }

    /// Writes `static void {name}(T instance)` performing all injections, nested ones included
    pub fn emit_injector(
        &self,
        writer: &mut CodeWriter,
        name: &str,
        instance_type: &str,
        injections: &[PropertyInjectionDescriptor],
    ) {
        writer.open(format!("public static void {name}({instance_type} instance)"));
        let mut counter = 0;
        self.emit_assignments(writer, "instance", injections, &mut counter);
        writer.close();
    }

    fn emit_assignments(
        &self,
        writer: &mut CodeWriter,
        target: &str,
        injections: &[PropertyInjectionDescriptor],
        counter: &mut usize,
    ) {
        for injection in injections {
            let variable = format!("value{}", *counter);
            *counter += 1;

            let property_type = self.model.type_name(&injection.property_type, TypeNameStyle::Code);
            writer.line(format!(
                "var {} = ({}){}!;",
                variable,
                property_type,
                self.value_expression(injection)
            ));
            self.emit_write(writer, target, &variable, injection);

            if !injection.nested.is_empty() {
                writer.open(format!("if ({variable} is not null)"));
                self.emit_assignments(writer, &variable, &injection.nested, counter);
                writer.close();
            }
        }
    }

    fn emit_write(
        &self,
        writer: &mut CodeWriter,
        target: &str,
        value: &str,
        injection: &PropertyInjectionDescriptor,
    ) {
        let owner = self.model.type_name(&injection.declaring_type, TypeNameStyle::Code);
        let field = injection
            .backing_field
            .clone()
            .unwrap_or_else(|| format!("<{}>k__BackingField", injection.name));
        let reflective_field = format!(
            "typeof({}).GetField({}, {})!.SetValue({}, {});",
            owner,
            string_literal(&field),
            INSTANCE_FLAGS,
            target,
            value
        );

        match injection.strategy {
            InjectionStrategy::DirectSetter => {
                writer.line(format!("{}.{} = {};", target, injection.name, value));
            }
            InjectionStrategy::InitOnlyAccessor | InjectionStrategy::BackingFieldAccess => {
                match &injection.generic_context {
                    Some(context) => {
                        let arguments: Vec<String> = context
                            .arguments
                            .iter()
                            .map(|sig| self.model.type_name(sig, TypeNameStyle::Code))
                            .collect();
                        writer.line("#if NET9_0_OR_GREATER");
                        writer.line(format!(
                            "{}<{}>.Field(({}){}) = {};",
                            self.generic_accessor_class(context.definition, &injection.name),
                            arguments.join(", "),
                            owner,
                            target,
                            value
                        ));
                    }
                    None => {
                        writer.line("#if NET8_0_OR_GREATER");
                        writer.line(format!(
                            "{}(({}){}) = {};",
                            self.accessor_name(injection),
                            owner,
                            target,
                            value
                        ));
                    }
                }
                writer.line("#else");
                writer.line(reflective_field);
                writer.line("#endif");
            }
            InjectionStrategy::ReflectionFallback => {
                writer.line("// Reflection fallback, not trim or AOT safe");
                writer.line(format!(
                    "typeof({}).GetProperty({}, {})!.SetValue({}, {});",
                    owner,
                    string_literal(&injection.name),
                    INSTANCE_FLAGS,
                    target,
                    value
                ));
            }
            InjectionStrategy::Unsupported => {}
        }
    }

    /// Expression producing the injected value
    fn value_expression(&self, injection: &PropertyInjectionDescriptor) -> String {
        let descriptor = &injection.data_source;
        match &descriptor.producer {
            DataSourceProducer::Literal { values } | DataSourceProducer::Matrix { values } => values
                .first()
                .map_or_else(|| "null".to_string(), |value| render_literal(self.model, value)),
            DataSourceProducer::ClassConstruction { types } => types.first().map_or_else(
                || "null".to_string(),
                |sig| format!("new {}()", self.model.type_name(sig, TypeNameStyle::Code)),
            ),
            _ => match &descriptor.wrapper_name {
                Some(wrapper) => format!(
                    "global::System.Linq.Enumerable.FirstOrDefault(global::{}.{}.{}(global::System.Array.Empty<object?>()))",
                    self.options.generated_namespace, WRAPPER_CLASS, wrapper
                ),
                None => "null".to_string(),
            },
        }
    }

    fn accessor_name(&self, injection: &PropertyInjectionDescriptor) -> String {
        let owner = self
            .model
            .type_name(&injection.declaring_type, TypeNameStyle::Identity);
        format!("GetBackingField_{}_{}", safe_identifier(&owner), injection.name)
    }

    fn generic_accessor_class(&self, definition: Token, property: &str) -> String {
        let owner = self
            .model
            .get_type(definition)
            .map_or_else(|| definition.to_string(), |symbol| self.model.full_name(&symbol));
        format!("BackingField_{}_{}", safe_identifier(&owner), property)
    }
}

/// All injections including nested ones, depth first
#[must_use]
pub fn flatten(injections: &[PropertyInjectionDescriptor]) -> Vec<&PropertyInjectionDescriptor> {
    let mut all = Vec::new();
    for injection in injections {
        all.push(injection);
        all.extend(flatten(&injection.nested));
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{DataSourceAnalyzer, PropertyInjectionResolver},
        config::ReflectionFallbackPolicy,
        model::{
            Accessibility, MethodBuilder, ProgramBuilder, PropertyBuilder, TypeSignature,
        },
        test::attributes,
    };

    #[test]
    fn test_strategies_emitted() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let fixture = program
            .class("Demo", "Fixture")
            .method(MethodBuilder::new("Value").as_static().returns(TypeSignature::String))
            .property(
                PropertyBuilder::new("Direct", TypeSignature::String)
                    .setter(Accessibility::Public)
                    .attribute(attrs.method_data_source("Value")),
            )
            .property(
                PropertyBuilder::new("Init", TypeSignature::String)
                    .init(Accessibility::Public)
                    .auto()
                    .attribute(attrs.method_data_source("Value")),
            )
            .property(
                PropertyBuilder::new("Hidden", TypeSignature::String)
                    .setter(Accessibility::Private)
                    .attribute(attrs.method_data_source("Value")),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let resolver =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);
        let injections = resolver.resolve(&TypeSignature::Class(fixture)).unwrap();
        assert_eq!(injections.len(), 3);

        let options = GeneratorOptions::default();
        let emitter = InjectionEmitter::new(&model, &options);
        let mut writer = CodeWriter::new();
        emitter.emit_accessors(&mut writer, &injections);
        emitter.emit_injector(&mut writer, "InjectProperties", "global::Demo.Fixture", &injections);
        let text = writer.finish();

        assert!(text.contains("instance.Direct = value0;"));
        assert!(text.contains("Name = \"<Init>k__BackingField\""));
        assert!(text.contains(
            "private static extern ref string GetBackingField_Demo_Fixture_Init(global::Demo.Fixture instance);"
        ));
        assert!(text.contains(
            "GetBackingField_Demo_Fixture_Init((global::Demo.Fixture)instance) = value1;"
        ));
        assert!(text.contains("#if NET8_0_OR_GREATER"));
        assert!(text.contains("// Reflection fallback, not trim or AOT safe"));
        assert!(text.contains(".GetProperty(\"Hidden\""));
        assert!(text.contains("DataSourceWrappers.Demo_Fixture__Value("));
    }

    #[test]
    fn test_generic_owner_accessor_class() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let source = program
            .class("Demo", "Source")
            .method(MethodBuilder::new("Value").as_static().returns(TypeSignature::I4))
            .build()
            .unwrap();
        let holder = program
            .class("Demo", "Holder")
            .generic_param("T")
            .property(
                PropertyBuilder::new("Item", TypeSignature::GenericParamType(0))
                    .init(Accessibility::Public)
                    .auto()
                    .attribute(attrs.method_data_source_on(TypeSignature::Class(source), "Value")),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
        let resolver =
            PropertyInjectionResolver::new(&model, &datasources, ReflectionFallbackPolicy::Warn);
        let closed = TypeSignature::GenericInst(
            Box::new(TypeSignature::Class(holder)),
            vec![TypeSignature::I4],
        );
        let injections = resolver.resolve(&closed).unwrap();
        assert_eq!(injections.len(), 1);

        let options = GeneratorOptions::default();
        let emitter = InjectionEmitter::new(&model, &options);
        let mut writer = CodeWriter::new();
        emitter.emit_generic_accessors(&mut writer, &injections);
        emitter.emit_injector(&mut writer, "Inject", "global::Demo.Holder<int>", &injections);
        let text = writer.finish();

        assert!(text.contains("#if NET9_0_OR_GREATER"));
        assert!(text.contains("internal static class BackingField_Demo_Holder_Item<T>"));
        assert!(
            text.contains("public static extern ref T Field(global::Demo.Holder<T> instance);")
        );
        assert!(text.contains("BackingField_Demo_Holder_Item<int>.Field("));
    }
}
