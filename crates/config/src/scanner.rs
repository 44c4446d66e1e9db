use crate::action::Action;
use crate::error::ConfigError;
use crate::lifecycle::ConfigContext;
use crate::module::Module;
use fxhash::FxHashSet;
use tracing::{debug, trace};

/// Predicate over dotted module names; `false` skips the module.
pub type ExcludeFilter<'f> = &'f dyn Fn(&str) -> bool;

/// Loads `root` and its descendants, collecting their pending actions in load order.
///
/// `seen` is shared across calls: a module already in it is not visited again,
/// so overlapping scans do not duplicate actions. The exclude filter applies to
/// descendants only. Modules loaded before a failure stay loaded.
///
/// # Errors
/// Returns the first error raised by a module's declare function.
pub fn scan(
    ctx: &ConfigContext,
    root: &Module,
    seen: &mut FxHashSet<String>,
    exclude: Option<ExcludeFilter<'_>>,
) -> Result<Vec<Action>, ConfigError> {
    let mut actions = Vec::new();
    if !seen.insert(root.name().to_owned()) {
        trace!(module = root.name(), "Already scanned");
        return Ok(actions);
    }

    ctx.load_module(root)?;
    actions.extend(ctx.pending_actions(root.name()));

    for module in root.descendants() {
        if !seen.insert(module.name().to_owned()) {
            continue;
        }
        if exclude.is_some_and(|keep| !keep(module.name())) {
            debug!(module = module.name(), "Excluded from scan");
            continue;
        }
        ctx.load_module(module)?;
        actions.extend(ctx.pending_actions(module.name()));
    }

    debug!(root = root.name(), count = actions.len(), "Scan finished");
    Ok(actions)
}
