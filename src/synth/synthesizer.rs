//! Metadata synthesis.
//!
//! [`MetadataSynthesizer`] turns one closed [`TestCandidate`] into one or more
//! [`TestMetadataRecord`]s by combining attribute classification, data sources, hooks,
//! property injection and the generated bindings.
//!
//! # Expansion
//!
//! Literal data is expanded at generation time: every `[Arguments]` row and every combination
//! of `[Matrix]` parameter values becomes its own record, with a `[n]` identity suffix and the
//! values bound. All other data sources (methods, properties, class data sources, generators)
//! stay lazy and are attached to a single record.
//!
//! # Failure isolation
//!
//! [`MetadataSynthesizer::synthesize_all`] runs every candidate separately, optionally on the
//! rayon pool. A candidate that returns an error *or panics* becomes a [`SynthesisFailure`];
//! all other candidates are unaffected.

use std::{
    collections::HashSet,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    analysis::{
        AttributeClassifier, AttributeFamily, DataSourceAnalyzer, DataSourceMarker,
        DependsOnMarker, Generatability, HookResolver, InjectionStrategy, InstantiationProvenance,
        PropertyInjectionDescriptor, PropertyInjectionResolver, TestCandidate,
    },
    codegen::injection::flatten,
    config::GeneratorOptions,
    diagnostics::{codes, Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    generator::panic_message,
    model::{AttributeArgument, Location, ProgramModel, Token, TypeNameStyle, TypeSignature},
    synth::{
        bindings::{data_parameter_types, instance_factory, test_invoker},
        identity::{display_name, identity},
        Dependency, ExecutionPolicy, RecordDataSource, RecordKey, TestDependency,
        TestMetadataRecord,
    },
    Error, Result,
};

/// A candidate that could not be synthesized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisFailure {
    /// `Type.Method` of the candidate
    pub candidate: String,
    /// Instantiated class
    pub class: TypeSignature,
    /// Test method
    pub method: Token,
    /// Error or panic message
    pub message: String,
    /// Declaration site of the method
    pub location: Option<Location>,
}

impl fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.message)
    }
}

/// Results of a synthesis run
#[derive(Debug, Default)]
pub struct SynthesisOutput {
    /// Records of all successful candidates, in candidate order
    pub records: Vec<TestMetadataRecord>,
    /// Failed candidates
    pub failures: Vec<SynthesisFailure>,
}

/// Builds metadata records from candidates
pub struct MetadataSynthesizer<'a> {
    model: &'a ProgramModel,
    options: &'a GeneratorOptions,
    classifier: AttributeClassifier<'a>,
    access: Generatability<'a>,
    datasources: &'a DataSourceAnalyzer<'a>,
    hooks: HookResolver<'a>,
    injection: PropertyInjectionResolver<'a>,
    diagnostics: &'a Diagnostics,
}

impl<'a> MetadataSynthesizer<'a> {
    /// Creates a synthesizer for code emitted into `assembly`
    #[must_use]
    pub fn new(
        model: &'a ProgramModel,
        options: &'a GeneratorOptions,
        assembly: &'a str,
        datasources: &'a DataSourceAnalyzer<'a>,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        MetadataSynthesizer {
            model,
            options,
            classifier: AttributeClassifier::new(model),
            access: Generatability::new(model, assembly),
            datasources,
            hooks: HookResolver::new(model, assembly),
            injection: PropertyInjectionResolver::new(
                model,
                datasources,
                options.reflection_fallback,
            ),
            diagnostics,
        }
    }

    /// Synthesizes every candidate, isolating failures per candidate
    #[must_use]
    pub fn synthesize_all(&self, candidates: &[TestCandidate]) -> SynthesisOutput {
        let results: Vec<std::result::Result<Vec<TestMetadataRecord>, SynthesisFailure>> =
            if self.options.parallel {
                candidates
                    .par_iter()
                    .map(|candidate| self.synthesize_isolated(candidate))
                    .collect()
            } else {
                candidates
                    .iter()
                    .map(|candidate| self.synthesize_isolated(candidate))
                    .collect()
            };

        let mut output = SynthesisOutput::default();
        for result in results {
            match result {
                Ok(records) => output.records.extend(records),
                Err(failure) => output.failures.push(failure),
            }
        }
        output
    }

    fn synthesize_isolated(
        &self,
        candidate: &TestCandidate,
    ) -> std::result::Result<Vec<TestMetadataRecord>, SynthesisFailure> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.synthesize(candidate)));
        let message = match outcome {
            Ok(Ok(records)) => return Ok(records),
            Ok(Err(error)) => error.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        let failure = SynthesisFailure {
            candidate: format!(
                "{}.{}",
                self.model.type_name(&candidate.class, TypeNameStyle::Identity),
                candidate.method.name
            ),
            class: candidate.class.clone(),
            method: candidate.method.token,
            message,
            location: candidate.method.location.clone(),
        };
        warn!(candidate = %failure.candidate, error = %failure.message, "test candidate failed");
        Err(failure)
    }

    /// Synthesizes the records of one candidate.
    ///
    /// # Errors
    ///
    /// Returns the first error of any data source, property injection or binding involved.
    pub fn synthesize(&self, candidate: &TestCandidate) -> Result<Vec<TestMetadataRecord>> {
        let class = &candidate.class;
        let method = &candidate.method;

        let method_families: Vec<AttributeFamily> = self
            .classifier
            .classify_all(&method.attributes)
            .into_iter()
            .map(|classified| classified.family)
            .collect();
        let policy = self.policy(candidate, &method_families);

        let parameter_types = candidate.parameter_types();
        if class.contains_generic_param()
            || parameter_types.iter().any(TypeSignature::contains_generic_param)
        {
            return Err(Error::Generic(format!(
                "{}.{} is not fully closed",
                self.model.type_name(class, TypeNameStyle::Identity),
                method.name
            )));
        }
        let parameter_names: Vec<String> = method
            .parameters
            .iter()
            .map(|param| param.name.clone())
            .collect();
        let data_types = data_parameter_types(self.model, &parameter_types);

        let mut literal_rows: Vec<Vec<AttributeArgument>> = Vec::new();
        let mut lazy_sources = Vec::new();
        for marker in admitted_markers(&method_families, candidate.method_provenance()) {
            match marker {
                DataSourceMarker::Arguments { values } => literal_rows.push(values.clone()),
                other => {
                    lazy_sources.push(self.record_source(other, &candidate.owner, &data_types)?);
                }
            }
        }
        literal_rows.extend(self.matrix_rows(candidate, &data_types)?);

        let class_sources = self.class_sources(class, candidate.class_provenance.as_ref())?;
        let constructor_arity = self.constructor_arity(class, &class_sources)?;
        let factory = instance_factory(self.model, &self.access, class, constructor_arity)?;
        let class_data_sources = class_sources
            .into_iter()
            .map(|(marker, supplied)| {
                let descriptor = self.datasources.analyze(&marker, class)?;
                let binding = self.datasources.bind(&descriptor, &factory.parameter_types)?;
                Ok(RecordDataSource {
                    descriptor,
                    binding,
                    supplied,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let injections = match self.injection.resolve(class) {
            Ok(injections) => injections,
            Err(error @ Error::ReflectionDenied { .. }) => {
                self.diagnostics.push(
                    Diagnostic::new(
                        codes::REFLECTION_FALLBACK,
                        DiagnosticSeverity::Error,
                        DiagnosticCategory::PropertyInjection,
                        error.to_string(),
                    )
                    .with_location(method.location.clone()),
                );
                return Err(error);
            }
            Err(error) => return Err(error),
        };
        self.report_reflection_fallbacks(&injections);
        let hooks = self.hooks.resolve(class, !injections.is_empty());
        let invoker = test_invoker(self.model, candidate);

        let record = |variant: Option<usize>,
                      arguments: Option<Vec<AttributeArgument>>,
                      data_sources: Vec<RecordDataSource>| {
            let mut policy = policy.clone();
            if policy.display_name.is_none() {
                policy.display_name = Some(display_name(
                    self.model,
                    &method.name,
                    arguments.as_deref(),
                ));
            }
            TestMetadataRecord {
                identity: identity(
                    self.model,
                    class,
                    &method.name,
                    &candidate.method_arguments,
                    &parameter_types,
                    variant,
                ),
                key: RecordKey {
                    class: class.clone(),
                    method: method.token,
                    method_arguments: candidate.method_arguments.clone(),
                    variant,
                },
                method: method.clone(),
                method_name: method.name.clone(),
                class: class.clone(),
                owner: candidate.owner.clone(),
                method_arguments: candidate.method_arguments.clone(),
                policy,
                data_sources,
                class_data_sources: class_data_sources.clone(),
                hooks: hooks.clone(),
                parameter_types: parameter_types.clone(),
                parameter_names: parameter_names.clone(),
                injections: injections.clone(),
                arguments,
                factory: factory.clone(),
                invoker: invoker.clone(),
                provenance: candidate.provenance.clone(),
                location: method.location.clone(),
            }
        };

        let mut records = Vec::new();
        for (index, row) in literal_rows.into_iter().enumerate() {
            let marker = DataSourceMarker::Arguments { values: row.clone() };
            let source = self.record_source(&marker, &candidate.owner, &data_types)?;
            records.push(record(Some(index), Some(row), vec![source]));
        }
        if records.is_empty() || !lazy_sources.is_empty() {
            records.push(record(None, None, lazy_sources));
        }

        debug!(
            candidate = %format!(
                "{}.{}",
                self.model.type_name(class, TypeNameStyle::Identity),
                method.name
            ),
            records = records.len(),
            "synthesized"
        );
        Ok(records)
    }

    fn record_source(
        &self,
        marker: &DataSourceMarker,
        owner: &TypeSignature,
        expected: &[TypeSignature],
    ) -> Result<RecordDataSource> {
        let descriptor = self.datasources.analyze(marker, owner)?;
        let binding = self.datasources.bind(&descriptor, expected)?;
        let supplied = match marker {
            DataSourceMarker::MethodDataSource { arguments, .. } => arguments.clone(),
            _ => Vec::new(),
        };
        Ok(RecordDataSource {
            descriptor,
            binding,
            supplied,
        })
    }

    /// Cartesian product of `[Matrix]` values over the data parameters.
    ///
    /// Empty when no parameter carries a matrix. Unmarked `bool` parameters take both values.
    fn matrix_rows(
        &self,
        candidate: &TestCandidate,
        data_types: &[TypeSignature],
    ) -> Result<Vec<Vec<AttributeArgument>>> {
        let cancellation = TypeSignature::ValueType(self.model.well_known().cancellation_token);
        let parameters: Vec<_> = candidate
            .method
            .parameters
            .iter()
            .filter(|param| {
                param.signature.substitute(candidate.type_arguments(), &candidate.method_arguments)
                    != cancellation
            })
            .collect();

        let columns: Vec<Option<Vec<AttributeArgument>>> = parameters
            .iter()
            .map(|param| {
                param
                    .attributes
                    .iter()
                    .find_map(|attribute| match self.classifier.classify(attribute) {
                        Some(AttributeFamily::DataSource(DataSourceMarker::Matrix { values })) => {
                            Some(values)
                        }
                        _ => None,
                    })
            })
            .collect();
        if columns.iter().all(Option::is_none) {
            return Ok(Vec::new());
        }

        let mut resolved = Vec::with_capacity(columns.len());
        for ((column, param), sig) in columns.into_iter().zip(&parameters).zip(data_types) {
            match column {
                Some(values) if !values.is_empty() => resolved.push(values),
                _ if *sig == TypeSignature::Boolean => resolved.push(vec![
                    AttributeArgument::Bool(true),
                    AttributeArgument::Bool(false),
                ]),
                _ => {
                    return Err(Error::DataSource {
                        member: format!("{}({})", candidate.method.name, param.name),
                        message: "matrix parameter has no values".to_string(),
                    })
                }
            }
        }

        let mut rows: Vec<Vec<AttributeArgument>> = vec![Vec::new()];
        for values in resolved {
            rows = rows
                .into_iter()
                .flat_map(|row| {
                    values.iter().map(move |value| {
                        let mut next = row.clone();
                        next.push(value.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(rows)
    }

    /// Data source markers applied to the class itself, with their supplied arguments
    fn class_sources(
        &self,
        class: &TypeSignature,
        provenance: Option<&InstantiationProvenance>,
    ) -> Result<Vec<(DataSourceMarker, Vec<AttributeArgument>)>> {
        let symbol = self.model.resolve(class).ok_or_else(|| {
            synthesis_error!(
                "cannot resolve {}",
                self.model.type_name(class, TypeNameStyle::Identity)
            )
        })?;

        let families: Vec<AttributeFamily> = self
            .classifier
            .classify_all(&symbol.attributes)
            .into_iter()
            .map(|classified| classified.family)
            .collect();
        Ok(admitted_markers(&families, provenance)
            .into_iter()
            .map(|marker| {
                let supplied = match marker {
                    DataSourceMarker::MethodDataSource { arguments, .. } => arguments.clone(),
                    _ => Vec::new(),
                };
                (marker.clone(), supplied)
            })
            .collect())
    }

    /// Parameter count of the first accessible constructor every class source binds to
    fn constructor_arity(
        &self,
        class: &TypeSignature,
        sources: &[(DataSourceMarker, Vec<AttributeArgument>)],
    ) -> Result<usize> {
        if sources.is_empty() {
            return Ok(0);
        }
        let symbol = self.model.resolve(class).ok_or_else(|| {
            synthesis_error!(
                "cannot resolve {}",
                self.model.type_name(class, TypeNameStyle::Identity)
            )
        })?;

        let mut descriptors = Vec::with_capacity(sources.len());
        for (marker, _) in sources {
            descriptors.push(self.datasources.analyze(marker, class)?);
        }

        self.model
            .constructors_of(&symbol)
            .iter()
            .filter(|ctor| self.access.is_member_accessible(ctor.accessibility))
            .find_map(|ctor| {
                let types: Vec<TypeSignature> = ctor
                    .parameters
                    .iter()
                    .map(|param| param.signature.substitute(class.generic_arguments(), &[]))
                    .collect();
                descriptors
                    .iter()
                    .all(|descriptor| self.datasources.bind(descriptor, &types).is_ok())
                    .then_some(types.len())
            })
            .ok_or_else(|| Error::DataSource {
                member: self.model.type_name(class, TypeNameStyle::Identity),
                message: "no accessible constructor accepts the class data source values"
                    .to_string(),
            })
    }

    fn policy(
        &self,
        candidate: &TestCandidate,
        method_families: &[AttributeFamily],
    ) -> ExecutionPolicy {
        let mut lineage = self.model.lineage(&candidate.class);
        lineage.reverse();
        let class_families: Vec<AttributeFamily> = lineage
            .iter()
            .filter_map(|ancestor| self.model.resolve(ancestor))
            .flat_map(|symbol| self.classifier.classify_all(&symbol.attributes))
            .map(|classified| classified.family)
            .collect();

        let mut policy = ExecutionPolicy::default();
        let mut dependencies: Vec<TestDependency> = Vec::new();

        for family in class_families.iter().chain(method_families) {
            match family {
                AttributeFamily::Skip { reason } => policy.skip = Some(reason.clone()),
                AttributeFamily::Timeout { milliseconds } => {
                    policy.timeout_ms = Some(*milliseconds);
                }
                AttributeFamily::Retry { count } => policy.retry_count = *count,
                AttributeFamily::Repeat { count } => policy.repeat_count = *count,
                AttributeFamily::Category(name) => {
                    if !policy.categories.contains(name) {
                        policy.categories.push(name.clone());
                    }
                }
                AttributeFamily::Property { name, value } => {
                    policy.properties.push((name.clone(), value.clone()));
                }
                AttributeFamily::DisplayName(name) => policy.display_name = Some(name.clone()),
                AttributeFamily::NotInParallel { keys } => {
                    policy.can_run_in_parallel = false;
                    for key in keys {
                        if !policy.parallel_keys.contains(key) {
                            policy.parallel_keys.push(key.clone());
                        }
                    }
                }
                AttributeFamily::DependsOn(marker) => {
                    let dependency = self.dependency(candidate, marker);
                    match dependencies
                        .iter_mut()
                        .find(|existing| existing.target == dependency.target)
                    {
                        Some(existing) => {
                            existing.proceed_on_failure |= dependency.proceed_on_failure;
                        }
                        None => dependencies.push(dependency),
                    }
                }
                _ => {}
            }
        }

        policy.dependencies = dependencies;
        policy
    }

    fn dependency(&self, candidate: &TestCandidate, marker: &DependsOnMarker) -> TestDependency {
        let class = marker.class.clone().unwrap_or_else(|| candidate.class.clone());
        let target = match &marker.method {
            Some(method) => Dependency::Method {
                class,
                method: method.clone(),
                parameter_types: marker.parameter_types.clone(),
            },
            None => Dependency::Class { class },
        };
        TestDependency {
            target,
            proceed_on_failure: marker.proceed_on_failure,
        }
    }

    fn report_reflection_fallbacks(&self, injections: &[PropertyInjectionDescriptor]) {
        let mut seen = HashSet::new();
        for injection in flatten(injections) {
            if injection.strategy != InjectionStrategy::ReflectionFallback
                || !seen.insert(injection.property)
            {
                continue;
            }
            self.diagnostics.push(
                Diagnostic::new(
                    codes::REFLECTION_FALLBACK,
                    DiagnosticSeverity::Warning,
                    DiagnosticCategory::PropertyInjection,
                    format!(
                        "property {}.{} is injected through reflection and is not trim safe",
                        self.model
                            .type_name(&injection.declaring_type, TypeNameStyle::Identity),
                        injection.name
                    ),
                )
                .with_location(injection.location.clone()),
            );
        }
    }
}

/// Data source markers of `families` that may feed the instantiation described by `provenance`.
///
/// `[Matrix]` values are expanded separately and never appear here.
fn admitted_markers<'f>(
    families: &'f [AttributeFamily],
    provenance: Option<&InstantiationProvenance>,
) -> Vec<&'f DataSourceMarker> {
    families
        .iter()
        .filter_map(|family| match family {
            AttributeFamily::DataSource(marker)
                if !matches!(marker, DataSourceMarker::Matrix { .. }) =>
            {
                Some(marker)
            }
            _ => None,
        })
        .enumerate()
        .filter(|(position, _)| provenance.is_none_or(|p| p.admits_marker(*position)))
        .map(|(_, marker)| marker)
        .collect()
}
