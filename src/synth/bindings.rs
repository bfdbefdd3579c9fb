//! Instance factory and invoker generation.
//!
//! Both bindings are rendered as C# lambdas over loosely typed inputs (`object?[] args`,
//! `object instance`) that cast back to the real signature, so the runner never needs to
//! reflect over the test class.

use std::collections::HashSet;

use crate::{
    analysis::{Generatability, TestCandidate},
    model::{ProgramModel, TypeNameStyle, TypeSignature},
    synth::{Completion, InstanceFactory, TestInvoker},
    Result,
};

const VALUE_TASK: &str = "global::System.Threading.Tasks.ValueTask";

/// Builds the instance factory of `class`, passing `constructor_arity` class data source
/// values to a public constructor.
///
/// Every `required` instance property is initialized to `default!`; those fed by a data
/// source are overwritten by property injection before the test runs.
///
/// # Errors
///
/// Returns [`crate::Error::Synthesis`] if the class cannot be resolved or has no accessible
/// constructor taking `constructor_arity` parameters.
pub fn instance_factory(
    model: &ProgramModel,
    access: &Generatability<'_>,
    class: &TypeSignature,
    constructor_arity: usize,
) -> Result<InstanceFactory> {
    let class_name = model.type_name(class, TypeNameStyle::Code);
    let symbol = model
        .resolve(class)
        .ok_or_else(|| synthesis_error!("cannot resolve test class {}", class_name))?;

    let constructor = model
        .constructors_of(&symbol)
        .into_iter()
        .filter(|ctor| access.is_member_accessible(ctor.accessibility))
        .find(|ctor| ctor.parameters.len() == constructor_arity)
        .ok_or_else(|| {
            synthesis_error!(
                "{} has no accessible constructor taking {} parameter(s)",
                class_name,
                constructor_arity
            )
        })?;

    let parameter_types: Vec<TypeSignature> = constructor
        .parameters
        .iter()
        .map(|param| param.signature.substitute(class.generic_arguments(), &[]))
        .collect();
    let arguments: Vec<String> = parameter_types
        .iter()
        .enumerate()
        .map(|(index, sig)| {
            format!(
                "({})args[{}]!",
                model.type_name(sig, TypeNameStyle::Code),
                index
            )
        })
        .collect();

    let mut seen = HashSet::new();
    let required_properties: Vec<String> = model
        .lineage(class)
        .iter()
        .filter_map(|ancestor| model.resolve(ancestor))
        .flat_map(|ancestor| model.properties_of(&ancestor))
        .filter(|property| property.is_required && !property.is_static)
        .filter(|property| seen.insert(property.name.clone()))
        .map(|property| property.name.clone())
        .collect();

    let mut text = format!("static args => new {}({})", class_name, arguments.join(", "));
    if !required_properties.is_empty() {
        let initializers: Vec<String> = required_properties
            .iter()
            .map(|name| format!("{name} = default!"))
            .collect();
        text.push_str(&format!(" {{ {} }}", initializers.join(", ")));
    }

    Ok(InstanceFactory {
        class: class.clone(),
        constructor: Some(constructor.token),
        parameter_types,
        required_properties,
        text,
    })
}

/// Builds the typed invoker of a candidate
#[must_use]
pub fn test_invoker(model: &ProgramModel, candidate: &TestCandidate) -> TestInvoker {
    let wk = model.well_known();
    let cancellation = TypeSignature::ValueType(wk.cancellation_token);
    let return_type = candidate.return_type();

    let completion = if return_type.token() == Some(wk.task)
        || model.is_instance_of(&return_type, wk.task_1)
    {
        Completion::Task
    } else if return_type.token() == Some(wk.value_task)
        || model.is_instance_of(&return_type, wk.value_task_1)
    {
        Completion::ValueTask
    } else {
        Completion::Synchronous
    };

    let mut cancellation_slots = Vec::new();
    let mut data_index = 0;
    let arguments: Vec<String> = candidate
        .parameter_types()
        .iter()
        .enumerate()
        .map(|(slot, sig)| {
            if *sig == cancellation {
                cancellation_slots.push(slot);
                "cancellationToken".to_string()
            } else {
                let argument = format!(
                    "({})args[{}]!",
                    model.type_name(sig, TypeNameStyle::Code),
                    data_index
                );
                data_index += 1;
                argument
            }
        })
        .collect();

    let is_static = candidate.method.is_static();
    let receiver = if is_static {
        model.type_name(&candidate.owner, TypeNameStyle::Code)
    } else {
        format!("(({})instance)", model.type_name(&candidate.class, TypeNameStyle::Code))
    };
    let generic = if candidate.method_arguments.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = candidate
            .method_arguments
            .iter()
            .map(|sig| model.type_name(sig, TypeNameStyle::Code))
            .collect();
        format!("<{}>", names.join(", "))
    };
    let call = format!(
        "{}.{}{}({})",
        receiver,
        candidate.method.name,
        generic,
        arguments.join(", ")
    );

    let body = match completion {
        Completion::Synchronous => {
            format!("{{ {call}; return {VALUE_TASK}.CompletedTask; }}")
        }
        Completion::Task => format!("new {VALUE_TASK}({call})"),
        Completion::ValueTask if return_type.token() == Some(wk.value_task) => call,
        Completion::ValueTask => format!("new {VALUE_TASK}({call}.AsTask())"),
    };

    TestInvoker {
        is_static,
        completion,
        cancellation_slots,
        text: format!("static (instance, args, cancellationToken) => {body}"),
    }
}

/// Parameter types that receive data, i.e. everything except `CancellationToken`
#[must_use]
pub fn data_parameter_types(
    model: &ProgramModel,
    parameter_types: &[TypeSignature],
) -> Vec<TypeSignature> {
    let cancellation = TypeSignature::ValueType(model.well_known().cancellation_token);
    parameter_types
        .iter()
        .filter(|sig| **sig != cancellation)
        .cloned()
        .collect()
}
