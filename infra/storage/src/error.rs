use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
#[strata_derive::strata_error]
pub enum StorageError {
    #[error("Storage I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    /// A line that is neither a section header, a comment, nor `key = value`.
    #[error("Malformed settings file {file}, line {line}{}: {message}", format_context(.context))]
    Parse {
        file: Cow<'static, str>,
        line: usize,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    #[error("Include cycle detected{}: {message}", format_context(.context))]
    IncludeCycle { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("File watcher failure{}: {source}", format_context(.context))]
    Watch { source: notify::Error, context: Option<Cow<'static, str>> },

    #[error("Internal storage error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
