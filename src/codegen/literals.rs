//! Attribute argument rendering.
//!
//! Literal data source rows are baked into generated code. [`render_literal`] produces a C#
//! expression of the value's exact type, [`display_literal`] the short form used in display
//! names.

use crate::{
    codegen::writer::string_literal,
    model::{AttributeArgument, ProgramModel, TypeNameStyle},
};

/// Renders a value as a C# expression of its static type
#[must_use]
pub fn render_literal(model: &ProgramModel, value: &AttributeArgument) -> String {
    use AttributeArgument as A;

    match value {
        A::Null => "null".to_string(),
        A::Bool(value) => value.to_string(),
        A::Char(value) => render_char(*value),
        A::I1(value) => cast("sbyte", *value),
        A::U1(value) => cast("byte", *value),
        A::I2(value) => cast("short", *value),
        A::U2(value) => cast("ushort", *value),
        A::I4(value) => value.to_string(),
        A::U4(value) => format!("{value}U"),
        A::I8(value) => format!("{value}L"),
        A::U8(value) => format!("{value}UL"),
        A::R4(value) => render_float(f64::from(*value), "float", "F"),
        A::R8(value) => render_float(*value, "double", "D"),
        A::String(value) => string_literal(value),
        A::Type(sig) => format!("typeof({})", model.type_name(sig, TypeNameStyle::Code)),
        A::Array(element, values) => {
            let element = model.type_name(element, TypeNameStyle::Code);
            if values.is_empty() {
                return format!("global::System.Array.Empty<{element}>()");
            }
            let values: Vec<String> = values
                .iter()
                .map(|value| render_literal(model, value))
                .collect();
            format!("new {}[] {{ {} }}", element, values.join(", "))
        }
        A::Enum(sig, value) => {
            let name = model.type_name(sig, TypeNameStyle::Code);
            if *value < 0 {
                format!("({name})({value})")
            } else {
                format!("({name}){value}")
            }
        }
    }
}

/// Renders a value for display names and test variant labels
#[must_use]
pub fn display_literal(model: &ProgramModel, value: &AttributeArgument) -> String {
    use AttributeArgument as A;

    match value {
        A::Null => "null".to_string(),
        A::String(value) => format!("\"{value}\""),
        A::Char(value) => format!("'{value}'"),
        A::Type(sig) => model.type_name(sig, TypeNameStyle::Identity),
        A::Array(_, values) => {
            let values: Vec<String> = values
                .iter()
                .map(|value| display_literal(model, value))
                .collect();
            format!("[{}]", values.join(", "))
        }
        A::Enum(_, value) => value.to_string(),
        other => {
            let rendered = render_literal(model, other);
            rendered
                .trim_start_matches(|c: char| c == '(' || c.is_ascii_alphabetic())
                .trim_start_matches(')')
                .trim_end_matches(|c: char| c.is_ascii_alphabetic())
                .to_string()
        }
    }
}

fn cast(keyword: &str, value: impl std::fmt::Display) -> String {
    format!("({keyword}){value}")
}

fn render_char(value: char) -> String {
    match value {
        '\'' => "'\\''".to_string(),
        '\\' => "'\\\\'".to_string(),
        '\n' => "'\\n'".to_string(),
        '\r' => "'\\r'".to_string(),
        '\t' => "'\\t'".to_string(),
        '\0' => "'\\0'".to_string(),
        c if c.is_control() => format!("'\\u{:04x}'", c as u32),
        c => format!("'{c}'"),
    }
}

fn render_float(value: f64, keyword: &str, suffix: &str) -> String {
    if value.is_nan() {
        format!("{keyword}.NaN")
    } else if value == f64::INFINITY {
        format!("{keyword}.PositiveInfinity")
    } else if value == f64::NEG_INFINITY {
        format!("{keyword}.NegativeInfinity")
    } else {
        format!("{value:?}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProgramBuilder, TypeSignature};

    #[test]
    fn test_primitives() {
        let model = ProgramBuilder::new("Demo.Tests").finish();

        assert_eq!(render_literal(&model, &AttributeArgument::I4(-3)), "-3");
        assert_eq!(render_literal(&model, &AttributeArgument::U1(7)), "(byte)7");
        assert_eq!(render_literal(&model, &AttributeArgument::I8(5)), "5L");
        assert_eq!(render_literal(&model, &AttributeArgument::R8(1.0)), "1.0D");
        assert_eq!(render_literal(&model, &AttributeArgument::R4(0.5)), "0.5F");
        assert_eq!(render_literal(&model, &AttributeArgument::R8(f64::NAN)), "double.NaN");
        assert_eq!(render_literal(&model, &AttributeArgument::Char('\'')), "'\\''");
        assert_eq!(render_literal(&model, &AttributeArgument::Null), "null");
        assert_eq!(
            render_literal(&model, &AttributeArgument::String("a\"b".into())),
            "\"a\\\"b\""
        );
    }

    #[test]
    fn test_composite() {
        let program = ProgramBuilder::new("Demo.Tests");
        let color = program
            .value_type("Demo", "Color")
            .build()
            .unwrap();
        let model = program.finish();

        assert_eq!(
            render_literal(&model, &AttributeArgument::Type(TypeSignature::String)),
            "typeof(string)"
        );
        assert_eq!(
            render_literal(
                &model,
                &AttributeArgument::Array(
                    TypeSignature::I4,
                    vec![AttributeArgument::I4(1), AttributeArgument::I4(2)]
                )
            ),
            "new int[] { 1, 2 }"
        );
        assert_eq!(
            render_literal(&model, &AttributeArgument::Array(TypeSignature::Object, vec![])),
            "global::System.Array.Empty<object>()"
        );
        assert_eq!(
            render_literal(
                &model,
                &AttributeArgument::Enum(TypeSignature::ValueType(color), -1)
            ),
            "(global::Demo.Color)(-1)"
        );
    }

    #[test]
    fn test_display() {
        let model = ProgramBuilder::new("Demo.Tests").finish();

        assert_eq!(display_literal(&model, &AttributeArgument::U1(7)), "7");
        assert_eq!(display_literal(&model, &AttributeArgument::I8(-5)), "-5");
        assert_eq!(display_literal(&model, &AttributeArgument::R8(2.5)), "2.5");
        assert_eq!(
            display_literal(&model, &AttributeArgument::String("x".into())),
            "\"x\""
        );
    }
}
