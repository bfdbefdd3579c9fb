use thiserror::Error;

use crate::model::Token;

macro_rules! synthesis_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Synthesis {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Synthesis {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most of these errors are *per-candidate*: the synthesizer catches them at the boundary of a
/// single test candidate, records a failure and keeps generating the remaining candidates.
/// Candidate filtering (inaccessible types, open generics, malformed hooks) never produces an
/// error at all; those constructs are simply dropped.
///
/// # Error Categories
///
/// ## Program Model Errors
/// - [`Error::TypeNotFound`] - A token did not resolve to a type in the program model
/// - [`Error::MemberNotFound`] - A named member does not exist on the given type
/// - [`Error::DuplicateType`] - Two type definitions share the same full name
///
/// ## Synthesis Errors
/// - [`Error::Synthesis`] - Generic synthesis failure with source location
/// - [`Error::DataSource`] - A data source could not be resolved or shaped
/// - [`Error::Unsupported`] - A construct the generator cannot express without reflection
/// - [`Error::Generic`] - Generic instantiation failure
/// - [`Error::ReflectionDenied`] - Property injection would need reflection but policy forbids it
/// - [`Error::RecursionLimit`] - Maximum recursion depth exceeded
///
/// ## Configuration Errors
/// - [`Error::Config`] - A build property could not be parsed
///
/// # Examples
///
/// ```rust
/// use testscope::{Error, GeneratorOptions};
///
/// let props = [("build_property.TestscopeMaxGenericDepth", "deep")];
/// match GeneratorOptions::from_build_properties(props) {
///     Err(Error::Config { key, value }) => {
///         assert_eq!(key, "build_property.TestscopeMaxGenericDepth");
///         assert_eq!(value, "deep");
///     }
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Synthesis of a candidate failed.
    ///
    /// Carries the source location where the failure was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what went wrong
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Synthesis - {file}:{line}: {message}")]
    Synthesis {
        /// The message to be printed for the Synthesis error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Failed to find a type in the program model.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type in program model - {0}")]
    TypeNotFound(Token),

    /// Failed to find a member on a type.
    #[error("Member '{member}' not found on type '{owner}'")]
    MemberNotFound {
        /// Display name of the type that was searched
        owner: String,
        /// Name of the member that is missing
        member: String,
    },

    /// A type with the same full name has already been defined.
    #[error("Duplicate type definition - {0}")]
    DuplicateType(String),

    /// A data source could not be classified or bound to its consumer.
    #[error("Data source '{member}': {message}")]
    DataSource {
        /// Member (method, property or attribute) that produces the data
        member: String,
        /// Description of the problem
        message: String,
    },

    /// The construct cannot be expressed by generated code.
    #[error("Unsupported construct - {0}")]
    Unsupported(String),

    /// Generic instantiation failed.
    #[error("Generic resolution failed - {0}")]
    Generic(String),

    /// Injection of a property would need runtime reflection and the active
    /// [`crate::config::ReflectionFallbackPolicy`] denies it.
    #[error("Property '{property}' on '{owner}' can only be injected through reflection")]
    ReflectionDenied {
        /// Display name of the type declaring the property
        owner: String,
        /// Name of the property
        property: String,
    },

    /// Recursion limit reached.
    ///
    /// Raised by nested property injection when composite property types nest deeper than
    /// the supported bound.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// A build property carried a value that could not be parsed.
    #[error("Invalid value '{value}' for build property '{key}'")]
    Config {
        /// Build property key
        key: String,
        /// Raw value that failed to parse
        value: String,
    },
}
