//! Tuple decomposition.
//!
//! `ValueTuple` values reach tests as single objects but are consumed as flat argument arrays.
//! [`TupleLayout`] computes, at generation time, the fixed field path to each element:
//! `Item1`..`Item7` for the first seven and `Rest` for the remainder, which is itself a tuple.
//! A 10-tuple therefore yields paths ending in `Rest.Item1`, `Rest.Item2` and `Rest.Item3`.
//!
//! Tuple-typed *elements* (a tuple inside a tuple) are either flattened or kept whole
//! depending on [`NestedTuples`]; the `Rest` chain is always followed because it is an encoding
//! artifact rather than a user element.

use crate::model::{ProgramModel, TypeSignature};

/// Number of direct `ItemN` fields before `Rest`
pub const DIRECT_ITEMS: usize = 7;

/// One step of a field path into a tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TupleAccess {
    /// `ItemN`, 1-based
    Item(u8),
    /// `Rest`
    Rest,
}

impl TupleAccess {
    /// Field name of the step
    #[must_use]
    pub fn field_name(&self) -> String {
        match self {
            TupleAccess::Item(index) => format!("Item{index}"),
            TupleAccess::Rest => "Rest".to_string(),
        }
    }
}

/// Whether tuple-typed elements are expanded into their own elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedTuples {
    /// Expand nested tuples in place
    Flatten,
    /// Keep nested tuples as one element
    Preserve,
}

/// A single element of a decomposed tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleElement {
    /// Field path from the tuple root
    pub path: Vec<TupleAccess>,
    /// Static element type
    pub signature: TypeSignature,
}

impl TupleElement {
    /// Renders the member access expression on `root`, e.g. `row.Rest.Item1`
    #[must_use]
    pub fn access_expression(&self, root: &str) -> String {
        let mut expression = root.to_string();
        for step in &self.path {
            expression.push('.');
            expression.push_str(&step.field_name());
        }
        expression
    }
}

/// Flat decomposition of a tuple type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleLayout {
    /// The decomposed tuple type
    pub signature: TypeSignature,
    /// Elements in positional order
    pub elements: Vec<TupleElement>,
}

impl TupleLayout {
    /// Decomposes `sig`, `None` if it is not a `ValueTuple` instantiation
    #[must_use]
    pub fn of(model: &ProgramModel, sig: &TypeSignature, nested: NestedTuples) -> Option<Self> {
        if !is_value_tuple(model, sig) {
            return None;
        }

        let mut elements = Vec::new();
        collect(model, sig, &mut Vec::new(), nested, &mut elements);
        Some(TupleLayout {
            signature: sig.clone(),
            elements,
        })
    }

    /// Number of flat elements
    #[must_use]
    pub fn arity(&self) -> usize {
        self.elements.len()
    }

    /// Flat element types
    #[must_use]
    pub fn element_types(&self) -> Vec<TypeSignature> {
        self.elements
            .iter()
            .map(|element| element.signature.clone())
            .collect()
    }
}

/// Returns true if `sig` is an instantiation of one of the `ValueTuple` definitions
#[must_use]
pub fn is_value_tuple(model: &ProgramModel, sig: &TypeSignature) -> bool {
    matches!(sig, TypeSignature::GenericInst(..))
        && sig
            .token()
            .and_then(|token| model.well_known().value_tuple_arity(token))
            .is_some()
}

fn collect(
    model: &ProgramModel,
    sig: &TypeSignature,
    prefix: &mut Vec<TupleAccess>,
    nested: NestedTuples,
    out: &mut Vec<TupleElement>,
) {
    for (index, element) in sig.generic_arguments().iter().enumerate() {
        let step = if index < DIRECT_ITEMS {
            TupleAccess::Item(index as u8 + 1)
        } else {
            TupleAccess::Rest
        };
        prefix.push(step);

        let expand = match step {
            TupleAccess::Rest => is_value_tuple(model, element),
            TupleAccess::Item(_) => {
                nested == NestedTuples::Flatten && is_value_tuple(model, element)
            }
        };
        if expand {
            collect(model, element, prefix, nested, out);
        } else {
            out.push(TupleElement {
                path: prefix.clone(),
                signature: element.clone(),
            });
        }

        prefix.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgramBuilder;

    #[test]
    fn test_simple_pair() {
        let program = ProgramBuilder::new("Demo.Tests");
        let pair = program.tuple(vec![TypeSignature::I4, TypeSignature::String]);
        let model = program.finish();

        let layout = TupleLayout::of(&model, &pair, NestedTuples::Flatten).unwrap();
        assert_eq!(layout.arity(), 2);
        assert_eq!(layout.elements[1].access_expression("row"), "row.Item2");
        assert_eq!(layout.element_types(), vec![TypeSignature::I4, TypeSignature::String]);
    }

    #[test]
    fn test_eight_elements_use_rest() {
        let program = ProgramBuilder::new("Demo.Tests");
        let eight = program.tuple(vec![TypeSignature::I4; 8]);
        let model = program.finish();

        let layout = TupleLayout::of(&model, &eight, NestedTuples::Preserve).unwrap();
        assert_eq!(layout.arity(), 8);
        let direct = layout
            .elements
            .iter()
            .filter(|element| element.path.len() == 1)
            .count();
        assert_eq!(direct, 7);
        assert_eq!(
            layout.elements[7].path,
            vec![TupleAccess::Rest, TupleAccess::Item(1)]
        );
        assert_eq!(layout.elements[7].access_expression("t"), "t.Rest.Item1");
    }

    #[test]
    fn test_long_rest_chain() {
        let program = ProgramBuilder::new("Demo.Tests");
        let sixteen = program.tuple((0..16).map(|_| TypeSignature::R8).collect());
        let model = program.finish();

        let layout = TupleLayout::of(&model, &sixteen, NestedTuples::Preserve).unwrap();
        assert_eq!(layout.arity(), 16);
        assert_eq!(
            layout.elements[15].access_expression("t"),
            "t.Rest.Rest.Item2"
        );
    }

    #[test]
    fn test_nested_element_policy() {
        let program = ProgramBuilder::new("Demo.Tests");
        let inner = program.tuple(vec![TypeSignature::I4, TypeSignature::I4]);
        let outer = program.tuple(vec![TypeSignature::String, inner.clone()]);
        let model = program.finish();

        let flat = TupleLayout::of(&model, &outer, NestedTuples::Flatten).unwrap();
        assert_eq!(flat.arity(), 3);
        assert_eq!(flat.elements[2].access_expression("t"), "t.Item2.Item2");

        let preserved = TupleLayout::of(&model, &outer, NestedTuples::Preserve).unwrap();
        assert_eq!(preserved.arity(), 2);
        assert_eq!(preserved.elements[1].signature, inner);
    }

    #[test]
    fn test_not_a_tuple() {
        let program = ProgramBuilder::new("Demo.Tests");
        let list = program.list_of(TypeSignature::I4);
        let model = program.finish();

        assert!(TupleLayout::of(&model, &list, NestedTuples::Flatten).is_none());
        assert!(TupleLayout::of(&model, &TypeSignature::I4, NestedTuples::Flatten).is_none());
    }
}
