//! Configuration for the source generator.
//!
//! This module provides [`GeneratorOptions`], which controls which passes run, the bounds of
//! the generic instantiation search, and the policies applied to the two places where the
//! generator has to choose between strictness and leniency: async data sources that stall, and
//! properties that can only be injected through reflection.
//!
//! Options are usually read from the host build's properties through
//! [`GeneratorOptions::from_build_properties`]; unknown keys are ignored.

use std::{str::FromStr, time::Duration};

use strum::{Display, EnumString};

use crate::{Error, Result};

/// Build property that disables all generated output when `false`
pub const PROPERTY_ENABLE_SOURCE_GENERATION: &str = "build_property.EnableSourceGeneration";
/// Build property overriding the maximum generic nesting depth
pub const PROPERTY_MAX_GENERIC_DEPTH: &str = "build_property.TestscopeMaxGenericDepth";
/// Build property overriding the async data source step timeout, in seconds
pub const PROPERTY_ASYNC_STEP_TIMEOUT: &str = "build_property.TestscopeAsyncStepTimeoutSeconds";
/// Build property selecting the [`AsyncTimeoutPolicy`]
pub const PROPERTY_ASYNC_TIMEOUT_POLICY: &str = "build_property.TestscopeAsyncTimeoutPolicy";
/// Build property selecting the [`ReflectionFallbackPolicy`]
pub const PROPERTY_REFLECTION_FALLBACK: &str = "build_property.TestscopeReflectionFallback";
/// Build property enabling the reflection usage advisory
pub const PROPERTY_VALIDATE_REFLECTION: &str = "build_property.TestscopeValidateReflectionUsage";
/// Build property naming the assembly being compiled
pub const PROPERTY_ASSEMBLY_NAME: &str = "build_property.AssemblyName";

/// What the generated async adapter does when one step of an async data source does not
/// complete within [`GeneratorOptions::async_step_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum AsyncTimeoutPolicy {
    /// Throw a `TimeoutException` naming the data source
    Fail,
    /// Stop iterating and keep the rows produced so far
    Truncate,
}

/// How properties that can only be written through reflection are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum ReflectionFallbackPolicy {
    /// Generate the reflective writer and report a warning
    Warn,
    /// Treat the property as a generation failure of every test using it
    Deny,
}

/// Configuration for the source generator.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Master switch; when false no source and no diagnostics are produced (default: true).
    pub enable_source_generation: bool,

    /// Overrides the emitting assembly name taken from the program model.
    pub emitting_assembly: Option<String>,

    /// Maximum generic nesting depth of a type argument (default: 5).
    pub max_generic_depth: usize,

    /// Bounded wait per step of an async data source (default: 30 seconds).
    pub async_step_timeout: Duration,

    /// Behaviour on async step timeout (default: [`AsyncTimeoutPolicy::Fail`]).
    pub async_timeout_policy: AsyncTimeoutPolicy,

    /// Treatment of reflection-only property injection.
    ///
    /// Default: [`ReflectionFallbackPolicy::Warn`].
    pub reflection_fallback: ReflectionFallbackPolicy,

    /// Run the reflection usage advisory pass (default: true).
    pub validate_reflection_usage: bool,

    /// Synthesize candidates on the rayon thread pool (default: true).
    pub parallel: bool,

    /// Namespace of the framework runtime the generated code calls into.
    pub runtime_namespace: String,

    /// Namespace the generated code is placed in.
    pub generated_namespace: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            enable_source_generation: true,
            emitting_assembly: None,
            max_generic_depth: 5,
            async_step_timeout: Duration::from_secs(30),
            async_timeout_policy: AsyncTimeoutPolicy::Fail,
            reflection_fallback: ReflectionFallbackPolicy::Warn,
            validate_reflection_usage: true,
            parallel: true,
            runtime_namespace: "Testscope.Core".to_string(),
            generated_namespace: "Testscope.Generated".to_string(),
        }
    }
}

impl GeneratorOptions {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for strict ahead-of-time builds.
    ///
    /// Reflection-only property injection fails the affected tests instead of warning.
    #[must_use]
    pub fn strict_aot() -> Self {
        Self {
            reflection_fallback: ReflectionFallbackPolicy::Deny,
            ..Self::default()
        }
    }

    /// Creates a configuration that keeps the legacy truncating async adapter.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            async_timeout_policy: AsyncTimeoutPolicy::Truncate,
            ..Self::default()
        }
    }

    /// Creates a configuration that runs every pass on the calling thread.
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Reads options from build properties on top of the defaults.
    ///
    /// Keys use the `build_property.` prefix of analyzer config options. Unknown keys are
    /// ignored, empty values keep the default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a known key whose value cannot be parsed.
    pub fn from_build_properties<I, K, V>(properties: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();

        for (key, value) in properties {
            let key = key.as_ref();
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }

            match key {
                PROPERTY_ENABLE_SOURCE_GENERATION => {
                    options.enable_source_generation = parse_bool(key, value)?;
                }
                PROPERTY_MAX_GENERIC_DEPTH => {
                    options.max_generic_depth = parse_value(key, value)?;
                }
                PROPERTY_ASYNC_STEP_TIMEOUT => {
                    options.async_step_timeout =
                        Duration::from_secs(parse_value::<u64>(key, value)?);
                }
                PROPERTY_ASYNC_TIMEOUT_POLICY => {
                    options.async_timeout_policy = parse_value(key, value)?;
                }
                PROPERTY_REFLECTION_FALLBACK => {
                    options.reflection_fallback = parse_value(key, value)?;
                }
                PROPERTY_VALIDATE_REFLECTION => {
                    options.validate_reflection_usage = parse_bool(key, value)?;
                }
                PROPERTY_ASSEMBLY_NAME => {
                    options.emitting_assembly = Some(value.to_string());
                }
                _ => {}
            }
        }

        Ok(options)
    }
}

fn config_error(key: &str, value: &str) -> Error {
    Error::Config {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| config_error(key, value))
}

// MSBuild properties are case insensitive
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(config_error(key, value))
    }
}
