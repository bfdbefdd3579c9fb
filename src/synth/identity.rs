//! Test identities and display names.

use crate::{
    codegen::literals::display_literal,
    model::{AttributeArgument, ProgramModel, TypeNameStyle, TypeSignature},
    synth::TestIdentity,
};

/// Builds `Namespace.Type.Method(ParamType1,ParamType2)`, with the method type arguments
/// after the name for generic methods
#[must_use]
pub fn identity(
    model: &ProgramModel,
    class: &TypeSignature,
    method_name: &str,
    method_arguments: &[TypeSignature],
    parameter_types: &[TypeSignature],
    variant: Option<usize>,
) -> TestIdentity {
    let class_name = model.type_name(class, TypeNameStyle::Identity);
    let generic = if method_arguments.is_empty() {
        String::new()
    } else {
        format!("<{}>", join_types(model, method_arguments))
    };
    let base = format!(
        "{}.{}{}({})",
        class_name,
        method_name,
        generic,
        join_types(model, parameter_types)
    );
    TestIdentity::new(base, variant)
}

/// Default display name: the method name followed by bound argument values, if any
#[must_use]
pub fn display_name(
    model: &ProgramModel,
    method_name: &str,
    arguments: Option<&[AttributeArgument]>,
) -> String {
    match arguments {
        Some(values) if !values.is_empty() => {
            let values: Vec<String> = values
                .iter()
                .map(|value| display_literal(model, value))
                .collect();
            format!("{}({})", method_name, values.join(", "))
        }
        _ => method_name.to_string(),
    }
}

fn join_types(model: &ProgramModel, types: &[TypeSignature]) -> String {
    types
        .iter()
        .map(|sig| model.type_name(sig, TypeNameStyle::Identity))
        .collect::<Vec<_>>()
        .join(",")
}
