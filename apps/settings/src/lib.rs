//! # Strata Settings
//!
//! Command-line view of every settings group declared by the built-in modules:
//! human-readable listings, the defaults as an INI `[DEFAULT]` section, or the
//! live values as JSON.
//!
//! ## Example
//! ```rust
//! use clap::Parser;
//! use strata_settings::{Cli, initialize, run};
//!
//! let cli = Cli::parse_from(["strata-settings", "--print"]);
//! let ctx = initialize(&cli).unwrap();
//! let mut out = Vec::new();
//! run(&cli, &ctx, &mut out).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("[DEFAULT]"));
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use strata_config::{
    ConfigContext, ConfigError, GroupSpec, Module, SettingsGroup, SettingsOptions,
    SettingsRegistry, WatchSetting, directives,
};
use strata_logger::{Logger, parse_level};
use strata_schema::{Invalid, SchemaNode, SchemaType, Value};
use strata_storage::RawSettingsMap;
use strata_storage::ini::IniDocument;
use tracing::debug;

/// Name of the group holding the tool's own logging settings.
pub const LOGGING_GROUP: &str = "logging";

const WRAP_WIDTH: usize = 70;

#[derive(Debug, Parser)]
#[command(name = "strata-settings")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Strata settings management")]
pub struct Cli {
    /// Runtime settings file
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// File with default settings
    #[arg(long, value_name = "FILE")]
    pub defaults: Option<PathBuf>,

    /// List all registered settings
    #[arg(short, long)]
    pub all: bool,

    /// List registered settings of one group
    #[arg(short, long = "list", value_name = "GROUP")]
    pub list: Option<String>,

    /// Print default settings in INI format
    #[arg(short, long = "print")]
    pub print: bool,

    /// Print current settings as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Modules declaring the settings this tool knows about.
#[must_use]
pub fn builtin_modules() -> Vec<Module> {
    vec![Module::new("strata").child(Module::new("logging").declare(|scope| {
        directives::settings(scope, logging_spec())?;
        Ok(())
    }))]
}

fn logging_spec() -> GroupSpec {
    GroupSpec::new(LOGGING_GROUP)
        .title("Logging")
        .description("Diagnostics written by strata tools.")
        .node(
            SchemaNode::new("level", SchemaType::Str)
                .default("warn")
                .title("Log level")
                .description("Minimum console level: error, warn, info, debug or trace.")
                .validator(|value| match value {
                    Value::Str(level) => {
                        parse_level(level).map(|_| ()).map_err(|e| Invalid::new(e.to_string()))
                    },
                    _ => Err(Invalid::new("Expected a level name")),
                }),
        )
        .node(
            SchemaNode::new("filter", SchemaType::Str)
                .title("Log filter")
                .description("Extra tracing directives, e.g. strata_config=debug."),
        )
        .node(
            SchemaNode::new("path", SchemaType::Str)
                .title("Log directory")
                .description("Directory for rolling log files. Empty disables file logging."),
        )
        .node(
            SchemaNode::new("json", SchemaType::Bool)
                .default(false)
                .title("JSON log files")
                .description("Write log files as JSON lines."),
        )
}

/// Declares the built-in modules and loads settings from the given files.
///
/// # Errors
/// Returns an error when the pipeline fails or a settings file cannot be read.
pub fn initialize(cli: &Cli) -> Result<ConfigContext> {
    let options = SettingsOptions {
        settings: cli.settings.clone(),
        defaults: cli.defaults.clone(),
        watch: WatchSetting::Off,
        ..SettingsOptions::default()
    };
    let ctx = ConfigContext::new();
    ctx.initialize(&builtin_modules(), &options).context("Failed to initialize settings")?;
    Ok(ctx)
}

/// Installs the global logger from the `logging` group; `-v` flags win over
/// the configured level.
///
/// # Errors
/// Returns an error for invalid logging settings or a second installation.
pub fn init_logger(cli: &Cli, registry: &SettingsRegistry) -> Result<Logger> {
    let group = registry.group(LOGGING_GROUP)?;
    let text = |key: &str| -> Result<String, ConfigError> { Ok(group.get(key)?.to_string()) };

    let mut builder = Logger::builder().name(env!("CARGO_PKG_NAME"));
    builder = if cli.verbose > 0 {
        builder.verbosity(cli.verbose)
    } else {
        builder.level(parse_level(&text("level")?)?)
    };
    let filter = text("filter")?;
    if !filter.is_empty() {
        builder = builder.env_filter(filter);
    }

    let path = text("path")?;
    let logger = if path.is_empty() {
        builder.init()?
    } else if group.get("json")? == Value::Bool(true) {
        builder.path(path).json().init()?
    } else {
        builder.path(path).init()?
    };
    Ok(logger)
}

/// Writes the output selected by `cli`.
///
/// # Errors
/// Returns an error for an unknown `--list` group or a failed write.
pub fn run(cli: &Cli, ctx: &ConfigContext, out: &mut dyn Write) -> Result<()> {
    let registry = ctx.settings();

    if cli.print {
        debug!("Printing defaults");
        out.write_all(render_defaults(&registry.export(true)).as_bytes())?;
        return Ok(());
    }

    if cli.json {
        let values = current_values(&registry.groups())?;
        writeln!(out, "{}", serde_json::to_string_pretty(&values)?)?;
        return Ok(());
    }

    let only = if cli.all { None } else { cli.list.as_deref() };
    if let Some(name) = only {
        registry.group(name)?;
    }
    out.write_all(render_listing(&registry.groups(), only)?.as_bytes())?;
    Ok(())
}

/// `[DEFAULT]` section holding every entry of `defaults`, keys sorted.
#[must_use]
pub fn render_defaults(defaults: &RawSettingsMap) -> String {
    let mut doc = IniDocument::new();
    let section = doc.defaults_mut();
    for (key, value) in defaults {
        section.set(key.as_str(), value.as_str());
    }
    doc.render()
}

/// Live values of every node of `groups`, stringified under `"group.node"` keys.
///
/// # Errors
/// Returns [`ConfigError`] when a group was dropped from its registry.
pub fn current_values(groups: &[SettingsGroup]) -> Result<RawSettingsMap, ConfigError> {
    let mut out = RawSettingsMap::new();
    for group in groups {
        for (node, value) in group.values()? {
            out.insert(format!("{}.{node}", group.name()), value.to_string());
        }
    }
    Ok(out)
}

/// Human-readable description of `groups`, or only of the group named `only`.
///
/// # Errors
/// Returns [`ConfigError`] when a group was dropped from its registry.
pub fn render_listing(groups: &[SettingsGroup], only: Option<&str>) -> Result<String, ConfigError> {
    let mut out = String::new();
    for group in groups.iter().filter(|g| only.is_none_or(|name| g.name() == name)) {
        let title = group.title()?;
        let title = if title.is_empty() { group.name().to_owned() } else { title };
        let description = group.description()?;

        out.push('\n');
        push_line(&mut out, &wrap(&title, "* ", "  "));
        if !description.is_empty() {
            push_line(&mut out, &wrap(&description, "    ", "    "));
        }
        out.push('\n');

        for node in group.nodes()? {
            let default = if node.is_required() {
                "<required>".to_owned()
            } else {
                node.default_value().to_string()
            };
            let entry = format!(
                "{}.{}: {} ({}: {default})",
                group.name(),
                node.name(),
                node.get_title(),
                node.kind().name()
            );
            push_line(&mut out, &wrap(&entry, "  - ", "    "));
            push_line(&mut out, &wrap(node.get_description(), "       ", "       "));
            out.push('\n');
        }
    }
    Ok(out)
}

fn push_line(out: &mut String, text: &str) {
    out.push_str(text);
    out.push('\n');
}

/// Greedy word wrap at [`WRAP_WIDTH`] columns. Blank text yields an empty string.
fn wrap(text: &str, initial: &str, subsequent: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let indent = if lines.is_empty() { initial } else { subsequent };
        if current.is_empty() {
            current = format!("{indent}{word}");
        } else if current.len() + 1 + word.len() <= WRAP_WIDTH {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = format!("{subsequent}{word}");
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}
