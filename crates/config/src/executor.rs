use crate::action::ResolvedAction;
use crate::error::ConfigError;
use crate::lifecycle::ConfigContext;
use tracing::{debug, error};

/// Runs resolved actions in order and stops at the first failure.
///
/// # Errors
/// Returns [`ConfigError::ActionFailed`] carrying the failing key.
pub fn execute(ctx: &ConfigContext, actions: &[ResolvedAction]) -> Result<(), ConfigError> {
    for action in actions {
        let label = action.label();
        debug!(action = %label, at = %action.info().location(), "Executing action");
        if let Err(err) = action.run(ctx) {
            error!(action = %label, at = %action.info().location(), error = %err, "Configuration action failed");
            return Err(ConfigError::ActionFailed { key: label.into(), cause: Box::new(err), context: None });
        }
    }
    debug!(count = actions.len(), "Actions executed");
    Ok(())
}
