//! Program analysis for test discovery.
//!
//! Everything here is a pure query over an immutable [`crate::model::ProgramModel`]. The
//! components build on each other in this order:
//!
//! - [`classify`] - maps attribute applications to a closed set of framework families
//! - [`access`] - decides what generated code can name without reflection
//! - [`tuples`] - computes fixed field paths into `ValueTuple` values
//! - [`datasource`] - normalises data sources into shared descriptors
//! - [`generics`] - finds concrete instantiations of open generic tests
//! - [`hooks`] - collects and orders setup and teardown hooks
//! - [`injection`] - resolves property injection and its write strategy
//! - [`discovery`] - turns test methods into closed candidates
//! - [`compat`] - flags reflection calls in user code
//!
//! Filtering happens silently: a construct that cannot be generated is dropped with a
//! `tracing` debug event and never becomes an error. Errors are reserved for constructs that
//! are clearly meant to be tests but cannot be expressed, such as a data source naming a
//! missing member.
//!
//! # Usage
//!
//! ```rust
//! use testscope::analysis::{DataSourceAnalyzer, GenericInstantiationResolver, TestDiscovery};
//! use testscope::model::{MethodBuilder, ProgramBuilder};
//!
//! let program = ProgramBuilder::new("Demo.Tests");
//! let test = testscope::model::AttributeData::new(program.well_known().test);
//! program
//!     .class("Demo", "Calculator")
//!     .method(MethodBuilder::new("Adds").attribute(test))
//!     .build()?;
//! let model = program.finish();
//!
//! let datasources = DataSourceAnalyzer::new(&model, "Demo.Tests");
//! let generics = GenericInstantiationResolver::new(&model, &datasources, "Demo.Tests", 5);
//! let candidates = TestDiscovery::new(&model, &generics, "Demo.Tests").discover();
//! assert_eq!(candidates.len(), 1);
//! # Ok::<(), testscope::Error>(())
//! ```

pub mod access;
pub mod classify;
pub mod compat;
pub mod datasource;
pub mod discovery;
pub mod generics;
pub mod hooks;
pub mod injection;
pub mod tuples;

pub use access::{contains_open_parameter, Generatability};
pub use classify::{
    AttributeClassifier, AttributeFamily, ClassifiedAttribute, DataSourceMarker, DependsOnMarker,
    HookMarker, HookScope, HookTiming,
};
pub use compat::{ReflectionCall, ReflectionUsage, ReflectionUsageAnalyzer};
pub use datasource::{
    safe_identifier, DataSourceAnalyzer, DataSourceDescriptor, DataSourceProducer,
    DataSourceShape, ElementShape, FactoryKey, MemberParameters, RowBinding, WRAPPER_CLASS,
};
pub use discovery::{TestCandidate, TestDiscovery};
pub use generics::{
    GenericInstantiation, GenericInstantiationResolver, GenericTarget, InstantiationProvenance,
};
pub use hooks::{
    GlobalHookSet, HookBinding, HookBundle, HookDescriptor, HookKind, HookParameters,
    HookResolver, HookSynchronicity, PROPERTY_INJECTION_ORDER,
};
pub use injection::{
    choose_strategy, GenericContext, InjectionStrategy, PropertyInjectionDescriptor,
    PropertyInjectionResolver, PropertyShape, MAX_NESTING_DEPTH,
};
pub use tuples::{NestedTuples, TupleAccess, TupleElement, TupleLayout, DIRECT_ITEMS};
