//! # Strata Config
//!
//! Declarative configuration engine. Modules declare configuration through
//! [`directives`]; the pipeline collects the resulting [`Action`]s, resolves
//! competing declarations and executes the winners. Settings groups declared
//! this way live in a [`SettingsRegistry`] backed by a pluggable
//! [`Loader`](strata_storage::Loader), with dirty tracking, change
//! notification and hot reload.
//!
//! # Pipeline
//!
//! 1. **Scan**: [`scanner::scan`] loads a module tree once, running each
//!    module's declare function with a [`Scope`].
//! 2. **Resolve**: [`resolver::resolve_conflicts`] groups actions by
//!    [`ConflictKey`]; the declaration in the alphabetically first file wins,
//!    two declarations in the same file are a [`ConflictReport`].
//! 3. **Execute**: [`executor::execute`] runs the winners in order and stops
//!    at the first failure.
//!
//! # Example
//!
//! ```rust
//! use strata_config::{ConfigContext, GroupSpec, Module, SettingsOptions, directives};
//! use strata_schema::{SchemaNode, SchemaType, Value};
//!
//! let app = Module::new("app").declare(|scope| {
//!     directives::settings(
//!         scope,
//!         GroupSpec::new("server")
//!             .title("Server")
//!             .node(SchemaNode::new("port", SchemaType::Int).default(8080)),
//!     )?;
//!     Ok(())
//! });
//!
//! let ctx = ConfigContext::new();
//! ctx.initialize(&[app], &SettingsOptions::default()).unwrap();
//!
//! let server = ctx.settings().group("server").unwrap();
//! server.set("port", 9090).unwrap();
//! assert_eq!(server.get("port").unwrap(), Value::Int(9090));
//! assert_eq!(ctx.settings().export(false)["server.port"], "9090");
//! ```

mod action;
mod components;
mod context;
pub mod directives;
mod error;
pub mod executor;
mod lifecycle;
mod module;
mod options;
pub mod resolver;
pub mod scanner;
mod settings;

pub use action::{Action, ComputeKey, ConflictKey, Discriminator, Payload, ResolvedAction};
pub use components::{AdapterKey, AdapterSpec, ComponentRegistry, EventCatalog, EventDescriptor};
pub use context::{DeclarationInfo, Scope, ScopeKind, SourceLocation};
pub use error::{ConfigError, ConfigErrorExt};
pub use lifecycle::{ConfigContext, InitState};
pub use module::{DeclareFn, Module};
pub use options::{SettingsOptions, WatchSetting};
pub use resolver::ConflictReport;
pub use settings::{
    GroupSpec, LoadMode, NodeHandle, SettingsGroup, SettingsGroupModified, SettingsInitialized,
    SettingsInitializing, SettingsRegistry,
};
