use std::borrow::Cow;
use strata_derive::strata_error;

#[strata_error]
pub enum LoaderError {
    #[error("I/O error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Malformed line {line}{}", format_context(.context))]
    Parse { line: usize, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn main() {}
