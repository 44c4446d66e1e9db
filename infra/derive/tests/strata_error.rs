use std::borrow::Cow;
use strata_derive::strata_error;

#[strata_error]
pub enum ProbeError {
    #[error("I/O error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Unknown key{}: {message}", format_context(.context))]
    UnknownKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn missing_file() -> Result<String, ProbeError> {
    std::fs::read_to_string("/definitely/not/here.cfg").context("Reading settings")
}

#[test]
fn strata_error_ui() {
    let t = trybuild::TestCases::new();
    t.pass("tests/ui/strata_error_pass.rs");
}

#[test]
fn source_errors_convert_with_context() {
    let err = missing_file().expect_err("file must be missing");
    assert!(matches!(err, ProbeError::Io { context: Some(ref c), .. } if c == "Reading settings"));
    assert!(err.to_string().starts_with("I/O error (Reading settings): "));
}

#[test]
fn context_is_attached_to_own_errors() {
    let result: Result<(), ProbeError> =
        Err(ProbeError::UnknownKey { message: "group.node".into(), context: None });
    let err = result.context("Lookup").expect_err("still an error");
    assert_eq!(err.to_string(), "Unknown key (Lookup): group.node");
}

#[test]
fn internal_variant_accepts_plain_strings() {
    let from_static: ProbeError = "broken invariant".into();
    let from_owned: ProbeError = format!("broken {}", 42).into();
    assert_eq!(from_static.to_string(), "Internal error: broken invariant");
    assert_eq!(from_owned.to_string(), "Internal error: broken 42");
}
