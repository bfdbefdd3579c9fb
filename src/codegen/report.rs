//! Reflection usage report.
//!
//! The report is a comment-only source so it ships with the build output without adding any
//! code to the compilation.

use std::collections::BTreeMap;

use crate::{
    analysis::{ReflectionCall, ReflectionUsage},
    codegen::writer::GeneratedSource,
};

/// Hint name of the report
pub const REPORT_HINT: &str = "AotCompatibilityReport.g.cs";

/// Renders the report, `None` when no reflection call was found
#[must_use]
pub fn compatibility_report(usages: &[ReflectionUsage]) -> Option<GeneratedSource> {
    if usages.is_empty() {
        return None;
    }

    let (handled, unhandled): (Vec<&ReflectionUsage>, Vec<&ReflectionUsage>) =
        usages.iter().partition(|usage| usage.handled);

    let mut out = String::new();
    out.push_str("// <auto-generated/>\n");
    out.push_str("// Reflection usage found while generating test metadata\n\n");
    out.push_str("/*\n");
    out.push_str("AOT COMPATIBILITY REPORT\n");
    out.push_str("========================\n\n");
    out.push_str(&format!("Total reflection usages found: {}\n", usages.len()));
    out.push_str(&format!("Handled by generated code: {}\n", handled.len()));
    out.push_str(&format!("Unhandled: {}\n\n", unhandled.len()));

    if !handled.is_empty() {
        let mut by_call: BTreeMap<ReflectionCall, usize> = BTreeMap::new();
        for usage in &handled {
            *by_call.entry(usage.call).or_default() += 1;
        }
        out.push_str("HANDLED REFLECTION USAGE:\n");
        out.push_str("-------------------------\n");
        for (call, count) in by_call {
            out.push_str(&format!("- {call}: {count}\n"));
        }
        out.push('\n');
    }

    if !unhandled.is_empty() {
        out.push_str("UNHANDLED REFLECTION USAGE:\n");
        out.push_str("---------------------------\n");
        for usage in &unhandled {
            out.push_str(&format!("- {} on {}\n", usage.member, usage.receiver));
            out.push_str(&format!("  Context: {}\n", usage.context));
            if let Some(location) = &usage.location {
                out.push_str(&format!(
                    "  Location: {}({},{})\n",
                    location.file, location.line, location.column
                ));
            }
        }
        out.push('\n');
    }
    out.push_str("*/\n");

    Some(GeneratedSource::new(REPORT_HINT, out))
}
