//! Conflict resolution over declared actions.
//!
//! Actions are bucketed by their evaluated key. Within a bucket candidates are
//! ordered by declaration file, then declaration index; the first one wins.
//! Candidates sharing the winner's file have equal precedence and form a
//! conflict. Every conflict is collected before failing, so one error lists
//! them all. Winners are returned in explicit order, falling back to the
//! declaration index.

use crate::action::{Action, ConflictKey, Payload, ResolvedAction};
use crate::context::DeclarationInfo;
use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Every conflicting key with all of its declaration locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    conflicts: BTreeMap<ConflictKey, Vec<DeclarationInfo>>,
}

impl ConflictReport {
    pub fn keys(&self) -> impl Iterator<Item = &ConflictKey> {
        self.conflicts.keys()
    }

    #[must_use]
    pub fn locations(&self, key: &ConflictKey) -> Option<&[DeclarationInfo]> {
        self.conflicts.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Conflicting configuration actions")?;
        for (key, infos) in &self.conflicts {
            write!(f, "\n  For: {key}")?;
            for info in infos {
                let location = info.location();
                write!(
                    f,
                    "\n    File \"{}\", line {}, in {}",
                    location.file(),
                    location.line(),
                    info.enclosing()
                )?;
                if let Some(source) = info.source() {
                    write!(f, "\n      {}", source.trim())?;
                }
            }
        }
        Ok(())
    }
}

struct Candidate {
    index: usize,
    position: i64,
    info: DeclarationInfo,
    payload: Payload,
}

/// Turns declared actions into a conflict-free execution order.
///
/// # Errors
/// Returns [`ConfigError::Conflict`] listing every key whose leading candidates
/// share a declaration file.
pub fn resolve_conflicts(actions: Vec<Action>) -> Result<Vec<ResolvedAction>, ConfigError> {
    let mut buckets: BTreeMap<ConflictKey, Vec<Candidate>> = BTreeMap::new();
    let mut winners: Vec<(i64, usize, ResolvedAction)> = Vec::with_capacity(actions.len());

    for (index, action) in actions.into_iter().enumerate() {
        let (discriminator, order, info, payload) = action.into_parts();
        let position = order.unwrap_or_else(|| i64::try_from(index).unwrap_or(i64::MAX));
        match discriminator.evaluate(&info) {
            Some(key) => {
                buckets.entry(key).or_default().push(Candidate { index, position, info, payload });
            },
            None => winners.push((position, index, ResolvedAction::new(None, info, payload))),
        }
    }

    let mut report = ConflictReport::default();
    for (key, mut candidates) in buckets {
        candidates.sort_by(|a, b| a.info.file().cmp(b.info.file()).then(a.index.cmp(&b.index)));

        if let [first, second, ..] = candidates.as_slice()
            && first.info.file() == second.info.file()
        {
            report.conflicts.insert(key, candidates.into_iter().map(|c| c.info).collect());
            continue;
        }

        let overridden = candidates.len() - 1;
        let Some(winner) = candidates.into_iter().next() else {
            continue;
        };
        if overridden > 0 {
            debug!(%key, winner = %winner.info.location(), overridden, "Declaration overrides others");
        }
        winners.push((winner.position, winner.index, ResolvedAction::new(Some(key), winner.info, winner.payload)));
    }

    if !report.is_empty() {
        return Err(ConfigError::Conflict { report, context: None });
    }

    winners.sort_by_key(|(position, index, _)| (*position, *index));
    debug!(count = winners.len(), "Actions resolved");
    Ok(winners.into_iter().map(|(_, _, action)| action).collect())
}
