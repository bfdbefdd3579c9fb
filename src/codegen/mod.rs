//! C# source emission.
//!
//! Every emitter turns already resolved analysis results into text; no emitter looks up
//! symbols to make a decision. The generated sources are:
//!
//! - `DataSourceWrappers.g.cs` - one typed wrapper per shared data source, plus the async
//!   adapter ([`datasource`])
//! - `Tests/{Class}.g.cs` - property injectors and test registrations per class ([`tests`])
//! - `Hooks/{Family}/{Hook}_{n}.g.cs` - one registration per hook ([`hooks`])
//! - `AotCompatibilityReport.g.cs` - the reflection usage report ([`report`])

pub mod datasource;
pub mod hooks;
pub mod injection;
pub mod literals;
pub mod report;
pub mod tuples;
pub mod writer;

pub use datasource::{rows_factory, DataSourceEmitter, WRAPPERS_HINT};
pub use hooks::{HookEmitter, HookFamily};
pub use injection::InjectionEmitter;
pub use report::{compatibility_report, REPORT_HINT};
pub use tests::TestSourceEmitter;
pub use writer::{CodeWriter, GeneratedSource};
