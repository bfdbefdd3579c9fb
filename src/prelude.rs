//! # testscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! testscope library. Import this module to get quick access to model building, the
//! generator and its results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all testscope operations
pub use crate::Error;

/// The result type used throughout testscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Generator configuration and its policies
pub use crate::config::{AsyncTimeoutPolicy, GeneratorOptions, ReflectionFallbackPolicy};

/// The generator driver and its output
pub use crate::generator::{GeneratorOutput, SourceGenerator};

/// Cross-pass record storage
pub use crate::registry::{MetadataRegistry, RegistrationCallback};

/// Diagnostics reported to the host build
pub use crate::diagnostics::{
    codes, Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics,
};

// ================================================================================================
// Program Model
// ================================================================================================

/// Symbols, signatures and their construction
pub use crate::model::{
    Accessibility, AttributeArgument, AttributeData, FieldBuilder, InvocationSite, Location,
    MethodBuilder, MethodModifiers, ProgramBuilder, ProgramModel, PropertyBuilder, Token,
    TypeModifiers, TypeNameStyle, TypeSignature, WellKnown,
};

// ================================================================================================
// Analysis and Synthesis
// ================================================================================================

/// Discovery and the analysis results records are built from
pub use crate::analysis::{
    DataSourceAnalyzer, HookDescriptor, HookScope, InjectionStrategy, TestCandidate,
    TestDiscovery,
};

/// Synthesized metadata
pub use crate::synth::{
    ExecutionPolicy, MetadataSynthesizer, SynthesisFailure, TestIdentity, TestMetadataRecord,
};

/// Generated sources
pub use crate::codegen::GeneratedSource;
