use crate::context::ScopeKind;
use crate::resolver::ConflictReport;
use std::borrow::Cow;
use strata_event_bus::EventBusError;
use strata_schema::ValidationError;
use strata_storage::StorageError;

/// Errors raised by the configuration pipeline and the settings registry.
#[strata_derive::strata_error]
pub enum ConfigError {
    /// A directive was used outside the scopes it allows.
    #[error("Directive `{directive}` is not allowed in {scope} scope{}", format_context(.context))]
    Scope { directive: Cow<'static, str>, scope: ScopeKind, context: Option<Cow<'static, str>> },

    /// An adapter was registered without an explicit provided capability.
    #[error("Ambiguous capability{}: {message}", format_context(.context))]
    AmbiguousCapability { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Two or more declarations compete for the same key at equal precedence.
    #[error("{report}{}", format_context(.context))]
    Conflict { report: ConflictReport, context: Option<Cow<'static, str>> },

    #[error("Already initialized{}: {message}", format_context(.context))]
    AlreadyInitialized { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("{source}{}", format_context(.context))]
    Validation { source: ValidationError, context: Option<Cow<'static, str>> },

    #[error("Unknown settings group{}: {message}", format_context(.context))]
    UnknownGroup { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Unknown settings node{}: {message}", format_context(.context))]
    UnknownNode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Duplicate settings node{}: {message}", format_context(.context))]
    DuplicateNode { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A configuration action failed; execution stopped at this action.
    #[error("Action {key} failed{}: {cause}", format_context(.context))]
    ActionFailed {
        key: Cow<'static, str>,
        cause: Box<ConfigError>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Settings storage error{}: {source}", format_context(.context))]
    Storage { source: StorageError, context: Option<Cow<'static, str>> },

    #[error("Settings options error{}: {source}", format_context(.context))]
    Options { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[error("Event bus error{}: {source}", format_context(.context))]
    Events { source: EventBusError, context: Option<Cow<'static, str>> },

    #[error("Internal configuration error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
