//! Tuple unwrapping statements.
//!
//! Emits the fixed field accesses computed by [`TupleLayout`] as plain assignments into an
//! argument array. No reflection is involved: every path is known when the code is generated.

use crate::{
    analysis::TupleLayout,
    codegen::writer::CodeWriter,
    model::{ProgramModel, TypeNameStyle},
};

/// Returns one `target[k] = root.Path;` statement per flat element
#[must_use]
pub fn unwrap_statements(
    layout: &TupleLayout,
    root: &str,
    target: &str,
    offset: usize,
) -> Vec<String> {
    layout
        .elements
        .iter()
        .enumerate()
        .map(|(index, element)| {
            format!(
                "{}[{}] = {};",
                target,
                offset + index,
                element.access_expression(root)
            )
        })
        .collect()
}

/// Writes a cast of `source` to the tuple type followed by the unwrap assignments.
///
/// The produced array is named `target` and sized to the tuple's flat arity.
pub fn emit_unwrap(
    writer: &mut CodeWriter,
    model: &ProgramModel,
    layout: &TupleLayout,
    source: &str,
    target: &str,
) {
    let tuple = model.type_name(&layout.signature, TypeNameStyle::Code);
    writer.line(format!("var tuple = ({tuple}){source}!;"));
    writer.line(format!("var {target} = new object?[{}];", layout.arity()));
    writer.lines(unwrap_statements(layout, "tuple", target, 0));
}
