use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};
use uuid::Uuid;

/// Name → identifier associations carried over from the previous run.
/// A name listed more than once keeps one identifier per occurrence, in
/// document order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    known: Option<HashMap<String, Vec<Uuid>>>,
}

impl Registry {
    /// Wrap whatever the prior output yielded. An absent or empty registry
    /// means every entity gets a fresh identifier; that is reported, not
    /// treated as a failure.
    pub fn from_prior(prior: Option<HashMap<String, Vec<Uuid>>>, taxonomy: &str) -> Self {
        let known = prior.filter(|m| m.values().any(|ids| !ids.is_empty()));
        if known.is_none() {
            warn!(taxonomy, "no prior identifiers found, assigning fresh UUIDs");
        }
        Self { known }
    }

    pub fn is_first_run(&self) -> bool {
        self.known.is_none()
    }

    pub fn len(&self) -> usize {
        self.known
            .as_ref()
            .map_or(0, |m| m.values().map(Vec::len).sum())
    }

    /// Fresh per-run state; the registry itself is never modified.
    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler {
            registry: self,
            occurrences: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    fn prior(&self, name: &str, occurrence: usize) -> Option<Uuid> {
        self.known.as_ref()?.get(name)?.get(occurrence).copied()
    }
}

/// Hands out identifiers for one run. The n-th record with a given name
/// reuses the n-th stored identifier for that name; no identifier is
/// handed out twice.
#[derive(Debug)]
pub struct Reconciler<'r> {
    registry: &'r Registry,
    occurrences: HashMap<String, usize>,
    issued: HashSet<Uuid>,
}

impl Reconciler<'_> {
    pub fn identify(&mut self, name: &str) -> Uuid {
        let seen = self.occurrences.entry(name.to_string()).or_insert(0);
        let occurrence = *seen;
        *seen += 1;

        if let Some(id) = self.registry.prior(name, occurrence) {
            if self.issued.insert(id) {
                return id;
            }
            debug!(name, %id, "prior identifier already used in this run");
        }

        loop {
            let id = Uuid::new_v4();
            if self.issued.insert(id) {
                return id;
            }
        }
    }
}
