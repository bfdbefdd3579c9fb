//! Generic instantiation resolution.
//!
//! Open generic test classes and methods never produce metadata by themselves; they need
//! concrete type arguments. [`GenericInstantiationResolver`] finds them with three strategies,
//! in precedence order:
//!
//! 1. **Explicit**: `[GenerateGenericTest(typeof(int))]` markers, honored verbatim
//! 2. **Inheritance**: a concrete, non-generic subclass closes the base (`class IntTests :
//!    NumberTests<int>`); the subclass becomes the declaring type of the inherited tests
//! 3. **Inference**: the static types of data source values are unified with the parameters
//!    typed by type parameters
//!
//! Every type parameter must be bound for an instantiation to exist, so a method
//! `M<T1, T2>` fed by a single-valued source yields nothing. Results are deduplicated by
//! argument list (per subclass for inherited instantiations), and arguments nested deeper than
//! the configured bound are skipped. Inferred instantiations remember which data source
//! attributes produced them, so `[Arguments(1)]` and `[Arguments("a")]` on `Echo<T>` feed one
//! row each to `Echo<int>` and `Echo<string>`.

use std::collections::{hash_map::Entry, HashMap};

use tracing::debug;

use crate::{
    analysis::{
        classify::{AttributeClassifier, AttributeFamily, DataSourceMarker},
        datasource::DataSourceAnalyzer,
        tuples::{NestedTuples, TupleLayout},
    },
    model::{
        Accessibility, AttributeArgument, AttributeData, GenericConstraint, GenericParam,
        MethodSymbol, ProgramModel, Token, TypeNameStyle, TypeSignature, TypeSymbol,
    },
};

/// The open generic construct being closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenericTarget {
    /// A generic type definition
    Type(Token),
    /// A generic method definition
    Method(Token),
}

/// Where an instantiation came from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstantiationProvenance {
    /// A `GenerateGenericTest` marker
    Explicit,
    /// A concrete subclass closing the generic base
    Inheritance {
        /// The subclass, which declares the inherited tests
        subclass: Token,
    },
    /// Unification with a data source
    Inferred {
        /// Factory key or description of the first data source
        source: String,
        /// Positions of the producing data source attributes, in declaration order and not
        /// counting `[Matrix]`; empty when only matrix values bound the arguments
        markers: Vec<usize>,
    },
}

impl InstantiationProvenance {
    /// Whether the data source attribute at `position` may feed this instantiation
    #[must_use]
    pub fn admits_marker(&self, position: usize) -> bool {
        match self {
            InstantiationProvenance::Inferred { markers, .. } => markers.contains(&position),
            _ => true,
        }
    }
}

/// A concrete substitution for an open generic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericInstantiation {
    /// The open construct
    pub target: GenericTarget,
    /// Type arguments in parameter order
    pub arguments: Vec<TypeSignature>,
    /// How the arguments were found
    pub provenance: InstantiationProvenance,
}

/// Finds concrete type arguments for open generic tests
pub struct GenericInstantiationResolver<'a> {
    model: &'a ProgramModel,
    classifier: AttributeClassifier<'a>,
    datasources: &'a DataSourceAnalyzer<'a>,
    assembly: &'a str,
    max_depth: usize,
}

impl<'a> GenericInstantiationResolver<'a> {
    /// Creates a resolver for types of `assembly`, skipping arguments deeper than `max_depth`
    #[must_use]
    pub fn new(
        model: &'a ProgramModel,
        datasources: &'a DataSourceAnalyzer<'a>,
        assembly: &'a str,
        max_depth: usize,
    ) -> Self {
        GenericInstantiationResolver {
            model,
            classifier: AttributeClassifier::new(model),
            datasources,
            assembly,
            max_depth,
        }
    }

    /// Returns the instantiations of a generic type definition
    #[must_use]
    pub fn resolve_type(&self, class: &TypeSymbol) -> Vec<GenericInstantiation> {
        if !class.is_generic() {
            return Vec::new();
        }

        let target = GenericTarget::Type(class.token);
        let arity = class.generic_params.len();
        let mut found = Vec::new();

        for family in self.families(&class.attributes) {
            if let AttributeFamily::GenerateGenericTest(arguments) = family {
                if arguments.len() == arity {
                    found.push(GenericInstantiation {
                        target,
                        arguments,
                        provenance: InstantiationProvenance::Explicit,
                    });
                }
            }
        }

        for subclass in self.model.types_in_assembly(self.assembly) {
            if subclass.is_generic() || subclass.is_abstract() || subclass.token == class.token {
                continue;
            }
            let base = self
                .model
                .base_chain(&TypeSignature::Class(subclass.token))
                .into_iter()
                .find(|ancestor| {
                    self.model.is_instance_of(ancestor, class.token)
                        && !ancestor.contains_generic_param()
                });
            if let Some(base) = base {
                found.push(GenericInstantiation {
                    target,
                    arguments: base.generic_arguments().to_vec(),
                    provenance: InstantiationProvenance::Inheritance {
                        subclass: subclass.token,
                    },
                });
            }
        }

        let open = class.open_signature();
        let params = &class.generic_params;
        for ctor in self.model.constructors_of(class) {
            let parameter_types: Vec<TypeSignature> = ctor
                .parameters
                .iter()
                .map(|param| param.signature.clone())
                .collect();
            if parameter_types.is_empty() {
                continue;
            }
            let markers = self.data_source_markers(&class.attributes);
            for (position, marker) in markers.iter().enumerate() {
                if let Some((arguments, source)) =
                    self.infer(marker, &open, &parameter_types, ParamKind::Type, params.len())
                {
                    found.push(GenericInstantiation {
                        target,
                        arguments,
                        provenance: InstantiationProvenance::Inferred {
                            source,
                            markers: vec![position],
                        },
                    });
                }
            }
        }

        self.finalize(found, params)
    }

    /// Returns the instantiations of a generic method declared on the closed `declaring` type
    #[must_use]
    pub fn resolve_method(
        &self,
        method: &MethodSymbol,
        declaring: &TypeSignature,
    ) -> Vec<GenericInstantiation> {
        if !method.is_generic() {
            return Vec::new();
        }

        let target = GenericTarget::Method(method.token);
        let arity = method.generic_params.len();
        let mut found = Vec::new();

        for family in self.families(&method.attributes) {
            if let AttributeFamily::GenerateGenericTest(arguments) = family {
                if arguments.len() == arity {
                    found.push(GenericInstantiation {
                        target,
                        arguments,
                        provenance: InstantiationProvenance::Explicit,
                    });
                }
            }
        }

        let type_args = declaring.generic_arguments();
        let parameter_types: Vec<TypeSignature> = method
            .parameters
            .iter()
            .map(|param| param.signature.substitute(type_args, &[]))
            .collect();

        let markers = self.data_source_markers(&method.attributes);
        for (position, marker) in markers.iter().enumerate() {
            if let Some((arguments, source)) =
                self.infer(marker, declaring, &parameter_types, ParamKind::Method, arity)
            {
                found.push(GenericInstantiation {
                    target,
                    arguments,
                    provenance: InstantiationProvenance::Inferred {
                        source,
                        markers: vec![position],
                    },
                });
            }
        }

        if let Some((arguments, source)) = self.infer_from_matrix(method, &parameter_types) {
            found.push(GenericInstantiation {
                target,
                arguments,
                provenance: InstantiationProvenance::Inferred {
                    source,
                    markers: Vec::new(),
                },
            });
        }

        self.finalize(found, &method.generic_params)
    }

    fn families(&self, attributes: &[AttributeData]) -> Vec<AttributeFamily> {
        attributes
            .iter()
            .filter_map(|attribute| self.classifier.classify(attribute))
            .collect()
    }

    fn data_source_markers(&self, attributes: &[AttributeData]) -> Vec<DataSourceMarker> {
        self.families(attributes)
            .into_iter()
            .filter_map(|family| match family {
                AttributeFamily::DataSource(marker) => Some(marker),
                _ => None,
            })
            .filter(|marker| !matches!(marker, DataSourceMarker::Matrix { .. }))
            .collect()
    }

    fn infer(
        &self,
        marker: &DataSourceMarker,
        owner: &TypeSignature,
        parameter_types: &[TypeSignature],
        kind: ParamKind,
        arity: usize,
    ) -> Option<(Vec<TypeSignature>, String)> {
        let (produced, source) = match marker {
            DataSourceMarker::Arguments { values } => (
                values.iter().map(|value| self.literal_type(value)).collect(),
                format!("Arguments({})", values.len()),
            ),
            DataSourceMarker::Generator {
                attribute_class,
                element_types,
                ..
            } => {
                if element_types.is_empty() {
                    return None;
                }
                let name = self
                    .model
                    .type_name(&TypeSignature::Class(*attribute_class), TypeNameStyle::Identity);
                (element_types.clone(), name)
            }
            DataSourceMarker::MethodDataSource { member, .. } => {
                let types = self.datasources.element_types(marker, owner)?;
                (types, member.clone())
            }
            DataSourceMarker::ClassDataSource { types } => {
                (types.clone(), "ClassDataSource".to_string())
            }
            DataSourceMarker::Matrix { .. } => return None,
        };

        let produced = self.align(produced, parameter_types.len())?;
        let mut bindings = vec![None; arity];
        for (pattern, concrete) in parameter_types.iter().zip(&produced) {
            if !self.unify(pattern, concrete, kind, &mut bindings) {
                return None;
            }
        }

        let arguments: Option<Vec<TypeSignature>> = bindings.into_iter().collect();
        arguments.map(|arguments| (arguments, source))
    }

    fn infer_from_matrix(
        &self,
        method: &MethodSymbol,
        parameter_types: &[TypeSignature],
    ) -> Option<(Vec<TypeSignature>, String)> {
        let mut bindings = vec![None; method.generic_params.len()];
        let mut any = false;

        for (param, pattern) in method.parameters.iter().zip(parameter_types) {
            let values = param.attributes.iter().find_map(|attribute| {
                match self.classifier.classify(attribute) {
                    Some(AttributeFamily::DataSource(DataSourceMarker::Matrix { values })) => {
                        Some(values)
                    }
                    _ => None,
                }
            });
            let Some(first) = values.as_ref().and_then(|values| values.first()) else {
                continue;
            };
            any = true;
            if !self.unify(pattern, &self.literal_type(first), ParamKind::Method, &mut bindings) {
                return None;
            }
        }

        if !any {
            return None;
        }
        let arguments: Option<Vec<TypeSignature>> = bindings.into_iter().collect();
        arguments.map(|arguments| (arguments, "Matrix".to_string()))
    }

    // Produced values match the parameters positionally; a single tuple spreads over several
    fn align(&self, produced: Vec<TypeSignature>, expected: usize) -> Option<Vec<TypeSignature>> {
        if produced.len() == expected {
            return Some(produced);
        }
        if let [single] = produced.as_slice() {
            for nested in [NestedTuples::Preserve, NestedTuples::Flatten] {
                if let Some(layout) = TupleLayout::of(self.model, single, nested) {
                    if layout.arity() == expected {
                        return Some(layout.element_types());
                    }
                }
            }
        }
        None
    }

    /// Binds type parameters of `pattern` so that it matches `concrete`
    fn unify(
        &self,
        pattern: &TypeSignature,
        concrete: &TypeSignature,
        kind: ParamKind,
        bindings: &mut [Option<TypeSignature>],
    ) -> bool {
        if !pattern.contains_generic_param() {
            return true;
        }

        match (pattern, concrete) {
            (TypeSignature::GenericParamMethod(index), _) if kind == ParamKind::Method => {
                bind(bindings, *index, concrete)
            }
            (TypeSignature::GenericParamType(index), _) if kind == ParamKind::Type => {
                bind(bindings, *index, concrete)
            }
            (TypeSignature::SzArray(p), TypeSignature::SzArray(c)) => {
                self.unify(p, c, kind, bindings)
            }
            (TypeSignature::GenericInst(..), _) => {
                let Some(definition) = pattern.token() else {
                    return false;
                };
                let candidate = if concrete.token() == Some(definition) {
                    Some(concrete.clone())
                } else {
                    self.model.find_implementation(concrete, definition)
                };
                let Some(candidate) = candidate else {
                    return false;
                };
                let (p_args, c_args) = (pattern.generic_arguments(), candidate.generic_arguments());
                p_args.len() == c_args.len()
                    && p_args
                        .iter()
                        .zip(c_args)
                        .all(|(p, c)| self.unify(p, c, kind, bindings))
            }
            _ => false,
        }
    }

    fn literal_type(&self, value: &AttributeArgument) -> TypeSignature {
        match value {
            AttributeArgument::Type(_) => TypeSignature::Class(self.model.well_known().system_type),
            other => other.static_type().unwrap_or(TypeSignature::Object),
        }
    }

    fn finalize(
        &self,
        found: Vec<GenericInstantiation>,
        params: &[GenericParam],
    ) -> Vec<GenericInstantiation> {
        let mut seen: HashMap<(Vec<TypeSignature>, Option<Token>), usize> = HashMap::new();
        let mut result: Vec<GenericInstantiation> = Vec::new();

        for instantiation in found {
            if instantiation.arguments.len() != params.len()
                || instantiation
                    .arguments
                    .iter()
                    .any(TypeSignature::contains_generic_param)
            {
                continue;
            }
            if let Some(too_deep) = instantiation
                .arguments
                .iter()
                .find(|arg| arg.generic_depth() > self.max_depth)
            {
                debug!(
                    target: "generics",
                    argument = %self.model.type_name(too_deep, TypeNameStyle::Identity),
                    max_depth = self.max_depth,
                    "skipping instantiation beyond the generic depth bound"
                );
                continue;
            }
            if !self.satisfies_constraints(&instantiation.arguments, params) {
                let reason = match instantiation.provenance {
                    InstantiationProvenance::Explicit => "explicit",
                    InstantiationProvenance::Inheritance { .. } => "inheritance",
                    InstantiationProvenance::Inferred { .. } => "inferred",
                };
                debug!(
                    target: "generics",
                    target_construct = ?instantiation.target,
                    arguments = %self.describe(&instantiation.arguments),
                    reason,
                    "skipping instantiation violating constraints"
                );
                continue;
            }

            let subclass = match instantiation.provenance {
                InstantiationProvenance::Inheritance { subclass } => Some(subclass),
                _ => None,
            };
            match seen.entry((instantiation.arguments.clone(), subclass)) {
                Entry::Occupied(entry) => {
                    if let (
                        InstantiationProvenance::Inferred { markers, .. },
                        InstantiationProvenance::Inferred { markers: more, .. },
                    ) = (&mut result[*entry.get()].provenance, instantiation.provenance)
                    {
                        for position in more {
                            if !markers.contains(&position) {
                                markers.push(position);
                            }
                        }
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(result.len());
                    result.push(instantiation);
                }
            }
        }

        result
    }

    fn satisfies_constraints(&self, arguments: &[TypeSignature], params: &[GenericParam]) -> bool {
        params.iter().zip(arguments).all(|(param, argument)| {
            param.constraints.iter().all(|constraint| match constraint {
                GenericConstraint::ValueType => self.is_value_type(argument),
                GenericConstraint::ReferenceType => !self.is_value_type(argument),
                GenericConstraint::NotNull => true,
                GenericConstraint::DefaultConstructor => {
                    self.is_value_type(argument)
                        || self.model.resolve(argument).is_some_and(|symbol| {
                            !symbol.is_abstract()
                                && self.model.constructors_of(&symbol).iter().any(|ctor| {
                                    ctor.parameters.is_empty()
                                        && ctor.accessibility == Accessibility::Public
                                })
                        })
                }
                GenericConstraint::Type(bound) => {
                    let bound = bound.substitute(arguments, &[]);
                    *argument == bound
                        || bound.token().is_some_and(|token| {
                            self.model.find_implementation(argument, token).is_some()
                        })
                }
            })
        })
    }

    fn describe(&self, arguments: &[TypeSignature]) -> String {
        arguments
            .iter()
            .map(|arg| self.model.type_name(arg, TypeNameStyle::Identity))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn is_value_type(&self, sig: &TypeSignature) -> bool {
        match sig {
            TypeSignature::String | TypeSignature::Object => false,
            TypeSignature::ValueType(_) => true,
            TypeSignature::GenericInst(base, _) => matches!(**base, TypeSignature::ValueType(_)),
            other => other.is_primitive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    Type,
    Method,
}

fn bind(bindings: &mut [Option<TypeSignature>], index: u32, concrete: &TypeSignature) -> bool {
    let Some(slot) = bindings.get_mut(index as usize) else {
        return false;
    };
    match slot {
        Some(existing) => existing == concrete,
        None => {
            *slot = Some(concrete.clone());
            true
        }
    }
}
