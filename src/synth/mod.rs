//! Test metadata synthesis.
//!
//! Turns closed [`crate::analysis::TestCandidate`]s into [`TestMetadataRecord`]s: the
//! identity, execution policy, data sources, hooks, property injections and the generated
//! factory and invoker bindings of each test.

mod bindings;
mod identity;
mod record;
mod synthesizer;

pub use bindings::{data_parameter_types, instance_factory, test_invoker};
pub use identity::{display_name, identity};
pub use record::{
    Completion, Dependency, ExecutionPolicy, InstanceFactory, RecordDataSource, RecordKey,
    TestDependency, TestIdentity, TestInvoker, TestMetadataRecord,
};
pub use synthesizer::{MetadataSynthesizer, SynthesisFailure, SynthesisOutput};
