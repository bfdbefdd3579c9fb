//! Synthesized test metadata.
//!
//! A [`TestMetadataRecord`] is self-sufficient: everything the runner needs to construct the
//! test class, produce arguments, run hooks and invoke the test is resolved here, so
//! executing it requires no further symbol lookup.

use std::{fmt, sync::Arc};

use crate::{
    analysis::{
        DataSourceDescriptor, HookBundle, InstantiationProvenance, PropertyInjectionDescriptor,
        RowBinding,
    },
    model::{AttributeArgument, Location, MethodRc, Token, TypeSignature},
};

/// Structural identity of a record, used for registry deduplication.
///
/// Built from symbols and signatures, never from rendered text, so two passes that emit the
/// same test always produce equal keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Closed class the test runs on
    pub class: TypeSignature,
    /// The test method
    pub method: Token,
    /// Method type arguments
    pub method_arguments: Vec<TypeSignature>,
    /// Index of the literal argument row, `None` when arguments are not expanded
    pub variant: Option<usize>,
}

/// Stable identity string of a test
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestIdentity {
    /// Full identity, including the variant suffix
    pub id: String,
    /// Identity without the variant suffix
    pub base: String,
    /// Literal expansion index
    pub variant: Option<usize>,
}

impl TestIdentity {
    /// Creates an identity from its base and an optional expansion index
    #[must_use]
    pub fn new(base: String, variant: Option<usize>) -> Self {
        let id = match variant {
            Some(index) => format!("{base}[{index}]"),
            None => base.clone(),
        };
        TestIdentity { id, base, variant }
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Target of a `DependsOn`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// Every test of a class
    Class {
        /// The class
        class: TypeSignature,
    },
    /// One named test of a class
    Method {
        /// Class declaring the test
        class: TypeSignature,
        /// Test method name
        method: String,
        /// Parameter types disambiguating overloads
        parameter_types: Option<Vec<TypeSignature>>,
    },
}

/// A resolved dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDependency {
    /// What must run first
    pub target: Dependency,
    /// Run even if the dependency failed
    pub proceed_on_failure: bool,
}

/// Attribute-derived execution settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    /// Skip reason when the test is skipped
    pub skip: Option<String>,
    /// Timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Retries after a failure
    pub retry_count: u32,
    /// Additional repetitions
    pub repeat_count: u32,
    /// Categories, deduplicated in declaration order
    pub categories: Vec<String>,
    /// Custom properties in declaration order
    pub properties: Vec<(String, String)>,
    /// Display name override
    pub display_name: Option<String>,
    /// False when marked `NotInParallel`
    pub can_run_in_parallel: bool,
    /// `NotInParallel` constraint keys
    pub parallel_keys: Vec<String>,
    /// Dependencies, deduplicated
    pub dependencies: Vec<TestDependency>,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        ExecutionPolicy {
            skip: None,
            timeout_ms: None,
            retry_count: 0,
            repeat_count: 0,
            categories: Vec::new(),
            properties: Vec::new(),
            display_name: None,
            can_run_in_parallel: true,
            parallel_keys: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

impl ExecutionPolicy {
    /// Returns true if the test is skipped
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }
}

/// A data source as consumed by one record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDataSource {
    /// The shared descriptor
    pub descriptor: Arc<DataSourceDescriptor>,
    /// How one element fills the consumer's parameters
    pub binding: RowBinding,
    /// Values passed to the producing member
    pub supplied: Vec<AttributeArgument>,
}

/// How a test method completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// Returns `void` or a value that is discarded
    Synchronous,
    /// Returns `Task`
    Task,
    /// Returns `ValueTask`
    ValueTask,
}

/// Generated construction of the test class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFactory {
    /// Constructed class
    pub class: TypeSignature,
    /// Chosen public constructor, `None` for the implicit parameterless one
    pub constructor: Option<Token>,
    /// Constructor parameter types, filled from class data sources
    pub parameter_types: Vec<TypeSignature>,
    /// `required` properties initialized to `default!` before injection
    pub required_properties: Vec<String>,
    /// C# lambda `static args => new T(..)`
    pub text: String,
}

/// Generated typed invocation of the test method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInvoker {
    /// Called without an instance
    pub is_static: bool,
    /// Await behavior
    pub completion: Completion,
    /// Argument slots filled with the test's cancellation token
    pub cancellation_slots: Vec<usize>,
    /// C# lambda `static (instance, args, cancellationToken) => ..`
    pub text: String,
}

/// One fully resolved test
#[derive(Debug, Clone)]
pub struct TestMetadataRecord {
    /// Stable identity
    pub identity: TestIdentity,
    /// Registry key
    pub key: RecordKey,
    /// Test method
    pub method: MethodRc,
    /// Method name
    pub method_name: String,
    /// Closed class the test runs on
    pub class: TypeSignature,
    /// Closed type declaring the method; differs from `class` for inherited tests
    pub owner: TypeSignature,
    /// Method type arguments
    pub method_arguments: Vec<TypeSignature>,
    /// Execution settings
    pub policy: ExecutionPolicy,
    /// Method-level data sources
    pub data_sources: Vec<RecordDataSource>,
    /// Class-level data sources feeding the constructor
    pub class_data_sources: Vec<RecordDataSource>,
    /// Hooks around the test
    pub hooks: HookBundle,
    /// Closed parameter types
    pub parameter_types: Vec<TypeSignature>,
    /// Parameter names
    pub parameter_names: Vec<String>,
    /// Property injections, base class properties first
    pub injections: Vec<PropertyInjectionDescriptor>,
    /// Literal arguments bound at generation time
    pub arguments: Option<Vec<AttributeArgument>>,
    /// Construction binding
    pub factory: InstanceFactory,
    /// Invocation binding
    pub invoker: TestInvoker,
    /// How the generic instantiation was found
    pub provenance: Option<InstantiationProvenance>,
    /// Declaration site
    pub location: Option<Location>,
}

impl TestMetadataRecord {
    /// Returns true if the record carries generation-time arguments
    #[must_use]
    pub fn has_bound_arguments(&self) -> bool {
        self.arguments.is_some()
    }

    /// Returns true if any data source needs the async adapter
    #[must_use]
    pub fn uses_async_sources(&self) -> bool {
        self.data_sources
            .iter()
            .chain(&self.class_data_sources)
            .any(|source| source.descriptor.shape.is_async())
    }
}

impl fmt::Display for TestMetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_suffix() {
        let plain = TestIdentity::new("Demo.Fixture.Adds(System.Int32)".into(), None);
        assert_eq!(plain.id, "Demo.Fixture.Adds(System.Int32)");

        let second = TestIdentity::new("Demo.Fixture.Adds(System.Int32)".into(), Some(1));
        assert_eq!(second.to_string(), "Demo.Fixture.Adds(System.Int32)[1]");
        assert_eq!(second.base, plain.base);
    }

    #[test]
    fn test_policy_default() {
        let policy = ExecutionPolicy::default();
        assert!(policy.can_run_in_parallel);
        assert!(!policy.is_skipped());
        assert!(policy.dependencies.is_empty());
    }
}
