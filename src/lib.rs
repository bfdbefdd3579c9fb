// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # testscope
//!
//! Compile-time test discovery and metadata synthesis for .NET test frameworks. `testscope`
//! reads a semantic model of a test assembly, finds tests, hooks and data sources, and emits
//! C# sources that register every test with the runtime without any reflection, so test
//! assemblies stay trimmable and ahead-of-time compilable.
//!
//! ## Features
//!
//! - **Test discovery** - test methods, inherited tests and closed generic instantiations
//! - **Data sources** - literal rows, matrices, methods, properties, class data sources and
//!   generator attributes, synchronous or async, shared through typed wrappers
//! - **Hooks** - ordered setup and teardown across the base chain plus global hooks
//! - **Property injection** - setters, `init` accessors and backing fields written without
//!   reflection wherever the target runtime allows it
//! - **Failure isolation** - one broken test never stops generation of the others
//!
//! ## Quick Start
//!
//! ```rust
//! use testscope::prelude::*;
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
//! for source in &output.sources {
//!     println!("{}", source.hint_name);
//! }
//! # Ok::<(), testscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`model`] - the symbol model of the compilation being processed
//! - [`analysis`] - pure queries: classification, accessibility, data sources, generics,
//!   hooks, property injection, discovery and the reflection advisory
//! - [`synth`] - turns candidates into self-sufficient [`synth::TestMetadataRecord`]s
//! - [`codegen`] - renders records, wrappers, hooks and the report as C#
//! - [`registry`] - merges records of independent passes
//! - [`generator`] - runs the passes with per-pass failure isolation
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T>`](Result). Most errors concern a single test
//! candidate and end up as a [`diagnostics::Diagnostic`] rather than aborting a run.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use testscope::prelude::*;
///
/// let options = GeneratorOptions::sequential();
/// assert!(!options.parallel);
/// ```
pub mod prelude;

/// The symbol model of a compilation.
///
/// A [`model::ProgramModel`] holds types, methods, properties and fields of the assembly being
/// compiled and the libraries it references. [`model::ProgramBuilder`] populates one from any
/// front end.
pub mod model;

pub mod analysis;

pub mod codegen;

pub mod synth;

pub mod registry;

pub mod generator;

/// Generator configuration
pub mod config;

/// Diagnostics reported to the host build
pub mod diagnostics;

/// `testscope` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `testscope` Error type.
///
/// Most variants describe why a single test candidate could not be generated.
pub use error::Error;

pub use config::{AsyncTimeoutPolicy, GeneratorOptions, ReflectionFallbackPolicy};
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSeverity, Diagnostics};
pub use generator::{GeneratorOutput, SourceGenerator};
pub use registry::MetadataRegistry;
