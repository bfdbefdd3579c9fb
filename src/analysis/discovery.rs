//! Test candidate discovery.
//!
//! Scans the types of the emitting assembly for methods carrying a test marker and turns them
//! into [`TestCandidate`]s, each fully closed: the class that is instantiated, the closed type
//! that declares the method, and the method's own type arguments.
//!
//! Where tests come from:
//!
//! - methods declared on a concrete class
//! - methods declared on abstract base classes, inherited by every concrete subclass
//! - methods declared on concrete base classes, when the subclass carries `[InheritsTests]`
//! - methods of generic classes, once per instantiation found by the
//!   [`GenericInstantiationResolver`]; inheritance instantiations make the closing subclass the
//!   instantiated class
//! - generic methods, once per method instantiation
//!
//! Anything that stays open or cannot be named by generated code is dropped here, with a
//! `debug` event and no diagnostic.

use std::collections::HashSet;

use tracing::debug;

use crate::{
    analysis::{
        access::{contains_open_parameter, Generatability},
        classify::{AttributeClassifier, AttributeFamily},
        generics::{GenericInstantiationResolver, InstantiationProvenance},
    },
    model::{MethodRc, ProgramModel, Token, TypeNameStyle, TypeSignature, TypeSymbol},
};

/// A closed test method ready for synthesis
#[derive(Debug, Clone)]
pub struct TestCandidate {
    /// The test method
    pub method: MethodRc,
    /// Type that is instantiated to run the test
    pub class: TypeSignature,
    /// Closed type declaring the method; equals `class` unless the test is inherited
    pub owner: TypeSignature,
    /// Type arguments of a generic method, empty otherwise
    pub method_arguments: Vec<TypeSignature>,
    /// How the class or method was closed, `None` when nothing was generic
    pub provenance: Option<InstantiationProvenance>,
    /// How the declaring generic class was closed, `None` for non-generic classes
    pub class_provenance: Option<InstantiationProvenance>,
}

impl TestCandidate {
    /// Structural identity of the candidate
    #[must_use]
    pub fn key(&self) -> (TypeSignature, Token, Vec<TypeSignature>) {
        (
            self.class.clone(),
            self.method.token,
            self.method_arguments.clone(),
        )
    }

    /// How the method itself was closed, `None` unless it is generic
    #[must_use]
    pub fn method_provenance(&self) -> Option<&InstantiationProvenance> {
        if self.method_arguments.is_empty() {
            None
        } else {
            self.provenance.as_ref()
        }
    }

    /// Type arguments applied to the declaring type's parameters
    #[must_use]
    pub fn type_arguments(&self) -> &[TypeSignature] {
        self.owner.generic_arguments()
    }

    /// Parameter types with all type arguments applied
    #[must_use]
    pub fn parameter_types(&self) -> Vec<TypeSignature> {
        self.method
            .parameters
            .iter()
            .map(|param| {
                param
                    .signature
                    .substitute(self.type_arguments(), &self.method_arguments)
            })
            .collect()
    }

    /// Return type with all type arguments applied
    #[must_use]
    pub fn return_type(&self) -> TypeSignature {
        self.method
            .return_type
            .substitute(self.type_arguments(), &self.method_arguments)
    }
}

/// Finds test candidates in the emitting assembly
pub struct TestDiscovery<'a> {
    model: &'a ProgramModel,
    classifier: AttributeClassifier<'a>,
    access: Generatability<'a>,
    generics: &'a GenericInstantiationResolver<'a>,
    assembly: &'a str,
}

impl<'a> TestDiscovery<'a> {
    /// Creates a scanner over the types of `assembly`
    #[must_use]
    pub fn new(
        model: &'a ProgramModel,
        generics: &'a GenericInstantiationResolver<'a>,
        assembly: &'a str,
    ) -> Self {
        TestDiscovery {
            model,
            classifier: AttributeClassifier::new(model),
            access: Generatability::new(model, assembly),
            generics,
            assembly,
        }
    }

    /// Returns every closed candidate, in type and declaration order
    #[must_use]
    pub fn discover(&self) -> Vec<TestCandidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for symbol in self.model.types_in_assembly(self.assembly) {
            for candidate in self.candidates_for(&symbol) {
                if seen.insert(candidate.key()) {
                    candidates.push(candidate);
                }
            }
        }

        candidates
    }

    /// Returns the candidates a single type contributes
    #[must_use]
    pub fn candidates_for(&self, symbol: &TypeSymbol) -> Vec<TestCandidate> {
        if symbol.is_interface() || symbol.is_value_type() {
            return Vec::new();
        }

        let mut out = Vec::new();
        if symbol.is_generic() {
            for instantiation in self.generics.resolve_type(symbol) {
                let owner = symbol.closed_signature(&instantiation.arguments);
                let class = match instantiation.provenance {
                    InstantiationProvenance::Inheritance { subclass } => {
                        TypeSignature::Class(subclass)
                    }
                    _ if symbol.is_abstract() => continue,
                    _ => owner.clone(),
                };
                self.collect_methods(
                    symbol,
                    &class,
                    &owner,
                    Some(&instantiation.provenance),
                    &mut out,
                );
            }
            return out;
        }

        if symbol.is_abstract() {
            return out;
        }

        let class = symbol.open_signature();
        self.collect_methods(symbol, &class, &class, None, &mut out);

        let inherits_all = self
            .classifier
            .classify_all(&symbol.attributes)
            .iter()
            .any(|attribute| attribute.family == AttributeFamily::InheritsTests);
        for ancestor in self.model.base_chain(&class) {
            let Some(base) = self.model.resolve(&ancestor) else {
                continue;
            };
            // Closed generic bases are handled through their inheritance instantiations
            if base.is_generic() {
                continue;
            }
            if base.is_abstract() || inherits_all {
                self.collect_methods(&base, &class, &ancestor, None, &mut out);
            }
        }

        out
    }

    fn collect_methods(
        &self,
        declaring: &TypeSymbol,
        class: &TypeSignature,
        owner: &TypeSignature,
        provenance: Option<&InstantiationProvenance>,
        out: &mut Vec<TestCandidate>,
    ) {
        for method in self.model.methods_of(declaring) {
            if method.is_constructor()
                || method.is_abstract()
                || !self.classifier.has_test_marker(&method.attributes)
            {
                continue;
            }

            if method.is_generic() {
                let instantiations = self.generics.resolve_method(&method, owner);
                if instantiations.is_empty() {
                    debug!(
                        target: "discovery",
                        method = %self.describe(owner, &method.name),
                        "generic test has no instantiation"
                    );
                }
                for instantiation in instantiations {
                    self.push(
                        TestCandidate {
                            method: method.clone(),
                            class: class.clone(),
                            owner: owner.clone(),
                            method_arguments: instantiation.arguments,
                            provenance: Some(instantiation.provenance),
                            class_provenance: provenance.cloned(),
                        },
                        out,
                    );
                }
            } else {
                self.push(
                    TestCandidate {
                        method: method.clone(),
                        class: class.clone(),
                        owner: owner.clone(),
                        method_arguments: Vec::new(),
                        provenance: provenance.cloned(),
                        class_provenance: provenance.cloned(),
                    },
                    out,
                );
            }
        }
    }

    fn push(&self, candidate: TestCandidate, out: &mut Vec<TestCandidate>) {
        let reason = if contains_open_parameter(
            &candidate.owner,
            &candidate.method,
            &candidate.method_arguments,
        ) || candidate.class.contains_generic_param()
        {
            Some("open generic parameter")
        } else if !self.access.is_type_generatable(&candidate.class) {
            Some("class is not accessible")
        } else if !self.access.is_method_generatable(
            &candidate.method,
            candidate.type_arguments(),
            &candidate.method_arguments,
        ) {
            Some("method signature cannot be generated")
        } else {
            None
        };

        match reason {
            Some(reason) => debug!(
                target: "discovery",
                method = %self.describe(&candidate.owner, &candidate.method.name),
                reason,
                "dropping test candidate"
            ),
            None => out.push(candidate),
        }
    }

    fn describe(&self, owner: &TypeSignature, method: &str) -> String {
        format!(
            "{}.{}",
            self.model.type_name(owner, TypeNameStyle::Identity),
            method
        )
    }
}
