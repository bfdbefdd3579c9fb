//! The generator driver.
//!
//! [`SourceGenerator::run`] executes the generation passes over one [`ProgramModel`]:
//!
//! 1. `synthesis` - discovery, generic resolution and metadata synthesis of every test
//! 2. `tests` - one registration source per test class
//! 3. `datasources` - the shared data source wrappers
//! 4. `hooks:Before`, `hooks:After`, `hooks:BeforeEvery`, `hooks:AfterEvery` - one
//!    registration per hook
//! 5. `reflection` - the reflection usage advisory and its report
//!
//! Each pass is isolated: a panic inside a pass is caught at the pass boundary and reported as
//! one [`codes::INTERNAL_FAILURE`], and the remaining passes still run. Failures of single
//! test candidates never reach this level; they are collected by the synthesizer.
//!
//! # Examples
//!
//! ```rust
//! use testscope::{
//!     model::{AttributeData, MethodBuilder, ProgramBuilder},
//!     GeneratorOptions, SourceGenerator,
//! };
//!
//! let program = ProgramBuilder::new("Demo.Tests");
//! let test = AttributeData::new(program.well_known().test);
//! program
//!     .class("Demo", "Calculator")
//!     .method(MethodBuilder::new("Adds").attribute(test))
//!     .build()?;
//! let model = program.finish();
//!
//! let output = SourceGenerator::new(GeneratorOptions::default()).run(&model);
//! assert_eq!(output.records.len(), 1);
//! assert!(output.source("Tests/Demo_Calculator.g.cs").is_some());
//! # Ok::<(), testscope::Error>(())
//! ```

use std::{
    collections::{BTreeMap, HashSet},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use crate::{
    analysis::{
        DataSourceAnalyzer, GenericInstantiationResolver, HookDescriptor, HookResolver,
        ReflectionUsageAnalyzer, TestDiscovery,
    },
    codegen::{
        compatibility_report, DataSourceEmitter, GeneratedSource, HookEmitter, HookFamily,
        TestSourceEmitter,
    },
    config::GeneratorOptions,
    diagnostics::{codes, Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics},
    model::{ProgramModel, TypeNameStyle, TypeSignature},
    registry::MetadataRegistry,
    synth::{MetadataSynthesizer, SynthesisFailure, TestMetadataRecord},
};

/// Everything one generator run produced
#[derive(Default)]
pub struct GeneratorOutput {
    /// Generated C# sources, in pass order
    pub sources: Vec<GeneratedSource>,
    /// Synthesized records, in candidate order
    pub records: Vec<Arc<TestMetadataRecord>>,
    /// The merged registry of this run
    pub registry: MetadataRegistry,
    /// Candidates that failed synthesis
    pub failures: Vec<SynthesisFailure>,
    /// Diagnostics for the host build
    pub diagnostics: Diagnostics,
}

impl GeneratorOutput {
    /// Looks up a generated source by hint name
    #[must_use]
    pub fn source(&self, hint_name: &str) -> Option<&GeneratedSource> {
        self.sources
            .iter()
            .find(|source| source.hint_name == hint_name)
    }

    /// Sources whose hint name starts with `prefix`
    #[must_use]
    pub fn sources_under(&self, prefix: &str) -> Vec<&GeneratedSource> {
        self.sources
            .iter()
            .filter(|source| source.hint_name.starts_with(prefix))
            .collect()
    }

    /// Returns true if any error diagnostic was reported
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Runs the generation passes
pub struct SourceGenerator {
    options: GeneratorOptions,
}

impl SourceGenerator {
    /// Creates a generator with the given options
    #[must_use]
    pub fn new(options: GeneratorOptions) -> Self {
        SourceGenerator { options }
    }

    /// The options this generator runs with
    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Runs every pass over `model`.
    ///
    /// Returns an empty output when source generation is disabled.
    #[must_use]
    pub fn run(&self, model: &ProgramModel) -> GeneratorOutput {
        let mut output = GeneratorOutput::default();
        if !self.options.enable_source_generation {
            info!(assembly = model.assembly(), "source generation disabled");
            return output;
        }

        let options = &self.options;
        let assembly = options
            .emitting_assembly
            .clone()
            .unwrap_or_else(|| model.assembly().to_string());
        let datasources = DataSourceAnalyzer::new(model, &assembly);
        let diagnostics = &output.diagnostics;

        let synthesis = run_pass("synthesis", diagnostics, || {
            let generics = GenericInstantiationResolver::new(
                model,
                &datasources,
                &assembly,
                options.max_generic_depth,
            );
            let candidates = TestDiscovery::new(model, &generics, &assembly).discover();
            let result =
                MetadataSynthesizer::new(model, options, &assembly, &datasources, diagnostics)
                    .synthesize_all(&candidates);
            info!(
                pass = "synthesis",
                candidates = candidates.len(),
                records = result.records.len(),
                failures = result.failures.len(),
                "synthesized test metadata"
            );
            (candidates.len(), result)
        });

        let (records, failures) = match synthesis {
            Some((candidates, result)) => {
                report_failures(diagnostics, &result.failures, candidates);
                let records: Vec<Arc<TestMetadataRecord>> =
                    result.records.into_iter().map(Arc::new).collect();
                (records, result.failures)
            }
            None => (Vec::new(), Vec::new()),
        };

        let batch = records.clone();
        output.registry.enqueue(Box::new(move |registry| {
            for record in batch {
                registry.register(record.key.clone(), record);
            }
        }));
        output.registry.initialize_all();

        let mut sources = Vec::new();

        if let Some(tests) = run_pass("tests", diagnostics, || {
            self.test_sources(model, &records, diagnostics)
        }) {
            sources.extend(tests);
        }

        if let Some(wrappers) = run_pass("datasources", diagnostics, || {
            let descriptors = datasources.descriptors();
            match DataSourceEmitter::new(model, options).emit(&descriptors) {
                Ok(source) => source,
                Err(err) => {
                    diagnostics.error(
                        codes::INTERNAL_FAILURE,
                        DiagnosticCategory::DataSource,
                        format!("data source wrappers could not be generated: {err}"),
                    );
                    None
                }
            }
        }) {
            sources.extend(wrappers);
        }

        sources.extend(self.hook_sources(model, diagnostics, || {
            self.collect_hooks(model, &assembly, &records)
        }));

        if options.validate_reflection_usage {
            if let Some(report) = run_pass("reflection", diagnostics, || {
                let usages =
                    ReflectionUsageAnalyzer::new(model, &options.generated_namespace).analyze();
                for usage in usages.iter().filter(|usage| !usage.handled) {
                    diagnostics.push(
                        Diagnostic::new(
                            codes::REFLECTION_USAGE,
                            DiagnosticSeverity::Warning,
                            DiagnosticCategory::Compatibility,
                            format!("{usage} is not trim or AOT compatible"),
                        )
                        .with_location(usage.location.clone()),
                    );
                }
                compatibility_report(&usages)
            }) {
                sources.extend(report);
            }
        }

        output.sources = sources;
        output.records = records;
        output.failures = failures;
        output
    }

    fn test_sources(
        &self,
        model: &ProgramModel,
        records: &[Arc<TestMetadataRecord>],
        diagnostics: &Diagnostics,
    ) -> Vec<GeneratedSource> {
        let mut by_class: BTreeMap<String, (TypeSignature, Vec<&TestMetadataRecord>)> =
            BTreeMap::new();
        for record in records {
            by_class
                .entry(model.type_name(&record.class, TypeNameStyle::Identity))
                .or_insert_with(|| (record.class.clone(), Vec::new()))
                .1
                .push(record);
        }

        let emitter = TestSourceEmitter::new(model, &self.options);
        by_class
            .into_iter()
            .filter_map(|(name, (class, records))| match emitter.emit(&class, &records) {
                Ok(source) => Some(source),
                Err(err) => {
                    warn!(class = %name, error = %err, "test class source failed");
                    diagnostics.push(
                        Diagnostic::new(
                            codes::CANDIDATE_FAILED,
                            DiagnosticSeverity::Error,
                            DiagnosticCategory::Candidate,
                            format!("tests of {name} could not be generated: {err}"),
                        )
                        .with_location(records.first().and_then(|record| record.location.clone())),
                    );
                    None
                }
            })
            .collect()
    }

    /// Class hooks of every test class plus global hooks, each once
    /// Emits one source per hook, each family in its own pass.
    ///
    /// A panicking `collect` is reported like any other failed pass and yields no hook sources.
    fn hook_sources(
        &self,
        model: &ProgramModel,
        diagnostics: &Diagnostics,
        collect: impl FnOnce() -> Vec<Arc<HookDescriptor>>,
    ) -> Vec<GeneratedSource> {
        let Some(hooks) = run_pass("hooks", diagnostics, collect) else {
            return Vec::new();
        };
        let emitter = HookEmitter::new(model, &self.options);
        let mut sources = Vec::new();
        for family in HookFamily::iter() {
            let pass = format!("hooks:{family}");
            let emitted = run_pass(&pass, diagnostics, || {
                hooks
                    .iter()
                    .filter(|hook| HookFamily::of(hook) == family)
                    .filter_map(|hook| match emitter.emit(hook) {
                        Ok(source) => source,
                        Err(err) => {
                            diagnostics.push(
                                Diagnostic::new(
                                    codes::HOOK_FAILED,
                                    DiagnosticSeverity::Error,
                                    DiagnosticCategory::Hook,
                                    format!("hook {} could not be generated: {err}", hook.name),
                                )
                                .with_location(hook.location.clone()),
                            );
                            None
                        }
                    })
                    .collect::<Vec<_>>()
            });
            if let Some(emitted) = emitted {
                sources.extend(emitted);
            }
        }
        sources
    }

    fn collect_hooks(
        &self,
        model: &ProgramModel,
        assembly: &str,
        records: &[Arc<TestMetadataRecord>],
    ) -> Vec<Arc<HookDescriptor>> {
        let resolver = HookResolver::new(model, assembly);
        let global = resolver.collect_global(&model.types_in_assembly(assembly));

        let mut seen = HashSet::new();
        records
            .iter()
            .flat_map(|record| record.hooks.iter().cloned())
            .chain(global.all().iter().cloned())
            .filter(|hook| seen.insert(hook_key(hook)))
            .collect()
    }
}

fn hook_key(hook: &HookDescriptor) -> (String, usize, HookFamily) {
    (hook.name.clone(), hook.declaration_index, HookFamily::of(hook))
}

fn report_failures(diagnostics: &Diagnostics, failures: &[SynthesisFailure], candidates: usize) {
    for failure in failures {
        diagnostics.push(
            Diagnostic::new(
                codes::CANDIDATE_FAILED,
                DiagnosticSeverity::Error,
                DiagnosticCategory::Candidate,
                format!("test {} was not generated: {}", failure.candidate, failure.message),
            )
            .with_location(failure.location.clone()),
        );
    }
    if !failures.is_empty() {
        diagnostics.info(
            codes::FAILURE_SUMMARY,
            DiagnosticCategory::Candidate,
            format!(
                "{} of {} test candidates failed to generate",
                failures.len(),
                candidates
            ),
        );
    }
}

/// Runs one pass, turning a panic into a single internal failure diagnostic
fn run_pass<T>(name: &str, diagnostics: &Diagnostics, pass: impl FnOnce() -> T) -> Option<T> {
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(result) => {
            info!(
                pass = name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "pass finished"
            );
            Some(result)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(pass = name, error = %message, "pass failed");
            diagnostics.error(
                codes::INTERNAL_FAILURE,
                DiagnosticCategory::Generator,
                format!("generator pass '{name}' failed: {message}"),
            );
            None
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("generator panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("generator panicked: {message}")
    } else {
        "generator panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::HookScope,
        model::{AttributeArgument, InvocationSite, MethodBuilder, ProgramBuilder},
        test::{attributes, fixtures},
    };

    #[test]
    fn test_disabled_produces_nothing() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        program
            .class("Demo", "Calculator")
            .method(MethodBuilder::new("Adds").attribute(attrs.test()))
            .build()
            .unwrap();
        let model = program.finish();

        let options = GeneratorOptions {
            enable_source_generation: false,
            ..GeneratorOptions::default()
        };
        let output = SourceGenerator::new(options).run(&model);
        assert!(output.sources.is_empty());
        assert!(output.records.is_empty());
        assert!(!output.diagnostics.has_any());
    }

    #[test]
    fn test_failure_summary() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        program
            .class("Demo", "Mixed")
            .method(
                MethodBuilder::new("Broken")
                    .param("value", TypeSignature::I4)
                    .attribute(attrs.test())
                    .attribute(attrs.method_data_source("Missing")),
            )
            .method(
                MethodBuilder::new("Works")
                    .param("value", TypeSignature::I4)
                    .attribute(attrs.test())
                    .attribute(attrs.arguments(vec![AttributeArgument::I4(3)])),
            )
            .build()
            .unwrap();
        let model = program.finish();

        let output = SourceGenerator::new(GeneratorOptions::default()).run(&model);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.failures.len(), 1);
        assert_eq!(output.diagnostics.by_code(codes::CANDIDATE_FAILED).len(), 1);
        let summary = output.diagnostics.by_code(codes::FAILURE_SUMMARY);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].message, "1 of 2 test candidates failed to generate");
        assert!(output.source("Tests/Demo_Mixed.g.cs").is_some());
        assert_eq!(output.registry.len(), 1);
    }

    #[test]
    fn test_hook_sources_by_family() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        program
            .class("Demo", "Hooked")
            .method(
                MethodBuilder::new("Open")
                    .as_static()
                    .attribute(attrs.before(HookScope::Class)),
            )
            .method(
                MethodBuilder::new("Everywhere")
                    .as_static()
                    .attribute(attrs.before_every(HookScope::Test)),
            )
            .method(
                MethodBuilder::new("Shutdown")
                    .as_static()
                    .attribute(attrs.after(HookScope::Assembly)),
            )
            .method(MethodBuilder::new("Runs").attribute(attrs.test()))
            .build()
            .unwrap();
        let model = program.finish();

        let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
        assert_eq!(output.sources_under("Hooks/Before/").len(), 1);
        assert_eq!(output.sources_under("Hooks/BeforeEvery/").len(), 1);
        assert_eq!(output.sources_under("Hooks/After/").len(), 1);
        assert!(output.sources_under("Hooks/AfterEvery/").is_empty());
    }

    #[test]
    fn test_hook_collection_panic_is_contained() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        program
            .class("Demo", "Hooked")
            .method(
                MethodBuilder::new("Shutdown")
                    .as_static()
                    .attribute(attrs.after(HookScope::Assembly)),
            )
            .build()
            .unwrap();
        let model = program.finish();
        let generator = SourceGenerator::new(GeneratorOptions::sequential());

        let diagnostics = Diagnostics::new();
        let collected = generator.hook_sources(&model, &diagnostics, || {
            generator.collect_hooks(&model, "Demo.Tests", &[])
        });
        assert_eq!(collected.len(), 1);
        assert!(!diagnostics.has_any());

        let sources = generator.hook_sources(&model, &diagnostics, || panic!("cyclic base chain"));
        assert!(sources.is_empty());
        let failures = diagnostics.by_code(codes::INTERNAL_FAILURE);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].message,
            "generator pass 'hooks' failed: generator panicked: cyclic base chain"
        );
    }

    #[test]
    fn test_reflection_usage_reported() {
        let program = ProgramBuilder::new("Demo.Tests");
        let attrs = attributes(&program);
        let fixture = program
            .class("Demo", "Reflective")
            .method(MethodBuilder::new("Runs").attribute(attrs.test()))
            .build()
            .unwrap();
        let runs = program.model().find_method(fixture, "Runs").unwrap().token;
        program.invocation(InvocationSite {
            containing_type: fixture,
            containing_method: Some(runs),
            receiver: "System.Type".to_string(),
            member: "GetProperty".to_string(),
            argument_type: None,
            location: None,
        });
        let model = program.finish();

        let output = SourceGenerator::new(GeneratorOptions::sequential()).run(&model);
        assert_eq!(output.diagnostics.by_code(codes::REFLECTION_USAGE).len(), 1);
        assert!(output.source("AotCompatibilityReport.g.cs").is_some());

        let quiet = GeneratorOptions {
            validate_reflection_usage: false,
            ..GeneratorOptions::sequential()
        };
        let output = SourceGenerator::new(quiet).run(&model);
        assert!(output.source("AotCompatibilityReport.g.cs").is_none());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "generator panicked: boom");
        let diagnostics = Diagnostics::new();
        let result: Option<()> = run_pass("explodes", &diagnostics, || panic!("boom"));
        assert!(result.is_none());
        assert_eq!(diagnostics.by_code(codes::INTERNAL_FAILURE).len(), 1);
    }

    #[test]
    fn test_fixture_scenarios() {
        let run = |model: Arc<ProgramModel>| {
            SourceGenerator::new(GeneratorOptions::sequential()).run(&model)
        };

        let plain = run(fixtures::plain_test());
        assert_eq!(plain.records.len(), 1);
        assert!(plain.records[0].data_sources.is_empty());
        assert!(plain.records[0].parameter_types.is_empty());
        assert!(plain.source("DataSourceWrappers.g.cs").is_none());

        let rows = run(fixtures::literal_rows());
        assert_eq!(rows.records.len(), 2);
        assert_eq!(rows.registry.len(), 2);

        let inherited = run(fixtures::generic_inheritance());
        assert!(inherited.failures.is_empty(), "{:?}", inherited.failures);
        assert_eq!(inherited.records.len(), 1);
        assert_eq!(
            inherited.records[0].identity.id,
            "Demo.IntTests.Works(System.Int32)"
        );

        let tuples = run(fixtures::tuple_source());
        let wrappers = tuples.source("DataSourceWrappers.g.cs").unwrap();
        assert!(wrappers.text.contains("public static class DataSourceWrappers"));
        let tests = tuples.source("Tests/Demo_Tuples.g.cs").unwrap();
        assert!(tests.text.contains("row[2] = tuple.Item3;"));

        let streams = run(fixtures::async_source());
        let wrappers = streams.source("DataSourceWrappers.g.cs").unwrap();
        assert!(wrappers.text.contains("ConvertToSync"));
        assert!(wrappers.text.contains("TimeoutException"));

        let injected = run(fixtures::init_only_injection());
        let tests = injected.source("Tests/Demo_Configured.g.cs").unwrap();
        assert!(tests.text.contains("#if NET8_0_OR_GREATER"));
        assert!(tests.text.contains("{ Name = default! }"));
        assert!(injected.diagnostics.by_code(codes::REFLECTION_FALLBACK).is_empty());
    }
}
