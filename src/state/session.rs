//! ProcessSession - load, apply, save with optimistic retries
//!
//! The controller works on in-memory trees; a session wires it to a
//! [`SnapshotStore`]. Each operation is applied to a freshly decoded tree and
//! saved against the version it was read at. On a conflict the whole cycle
//! runs again against the newer snapshot.

use super::snapshot::{from_snapshot, to_snapshot};
use super::store::SnapshotStore;
use crate::engine::{AlwaysMet, Controller, CriteriaEvaluator, Transition};
use crate::error::EngineResult;
use crate::models::{DataMap, StateTree};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Tree and transition after a persisted operation
#[derive(Debug, Clone)]
pub struct Applied {
    pub tree: StateTree,
    pub transition: Transition,
    /// Store version the tree was saved at
    pub version: u64,
}

pub struct ProcessSession<S, E = AlwaysMet> {
    store: S,
    controller: Controller<E>,
    max_attempts: u32,
    auto_start: bool,
}

impl<S: SnapshotStore> ProcessSession<S, AlwaysMet> {
    pub fn new(store: S) -> Self {
        Self::with_controller(store, Controller::new())
    }
}

impl<S: SnapshotStore, E: CriteriaEvaluator> ProcessSession<S, E> {
    pub fn with_controller(store: S, controller: Controller<E>) -> Self {
        Self {
            store,
            controller,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            auto_start: false,
        }
    }

    /// Attempts per operation; values below one are treated as one
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Start the first phase when a tree is created
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn controller(&self) -> &Controller<E> {
        &self.controller
    }

    /// Current persisted tree for a configuration item
    pub fn load(&self, ci_reference: &str) -> EngineResult<StateTree> {
        let stored = self.store.load(ci_reference)?;
        from_snapshot(&stored.snapshot)
    }

    /// Persist a newly generated tree; fails if the item already has one
    ///
    /// With auto-start a blocked first phase is still persisted before the
    /// criteria error is returned.
    pub fn create(&self, mut tree: StateTree) -> EngineResult<Applied> {
        let ci_reference = tree.ci_reference.clone();

        let outcome = if self.auto_start {
            self.controller.start_phase(&mut tree, None)
        } else {
            Ok(Transition::default())
        };
        let outcome = match outcome {
            Err(err) if !err.records_state() => return Err(err),
            other => other,
        };

        let snapshot = to_snapshot(&mut tree)?;
        let version = self.store.save(&ci_reference, &snapshot, 0)?;
        tracing::info!(ci = %ci_reference, template_id = %tree.template_id, version, "process created");

        outcome.map(|transition| Applied {
            tree,
            transition,
            version,
        })
    }

    /// Run one controller operation against the stored tree
    ///
    /// `op` may run more than once, so it must not consume its captures.
    pub fn apply<F>(&self, ci_reference: &str, op: F) -> EngineResult<Applied>
    where
        F: Fn(&Controller<E>, &mut StateTree) -> EngineResult<Transition>,
    {
        let mut attempt = 1;
        loop {
            let stored = self.store.load(ci_reference)?;
            let mut tree = from_snapshot(&stored.snapshot)?;

            // Blocked outcomes are saved like successes, then reported
            let outcome = match op(&self.controller, &mut tree) {
                Err(err) if !err.records_state() => return Err(err),
                other => other,
            };

            match self.persist(ci_reference, &mut tree, stored.version) {
                Ok(version) => {
                    return outcome.map(|transition| Applied {
                        tree,
                        transition,
                        version,
                    })
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    tracing::debug!(ci = ci_reference, attempt, error = %err, "retrying operation");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn start_phase(&self, ci_reference: &str, phase_index: Option<usize>) -> EngineResult<Applied> {
        self.apply(ci_reference, |controller, tree| {
            controller.start_phase(tree, phase_index)
        })
    }

    pub fn complete_activity(
        &self,
        ci_reference: &str,
        activity_id: &str,
        completion_data: Option<DataMap>,
    ) -> EngineResult<Applied> {
        self.apply(ci_reference, |controller, tree| {
            controller.complete_activity(tree, activity_id, completion_data.clone())
        })
    }

    pub fn skip_activity(&self, ci_reference: &str, activity_id: &str, reason: &str) -> EngineResult<Applied> {
        self.apply(ci_reference, |controller, tree| {
            controller.skip_activity(tree, activity_id, reason)
        })
    }

    fn persist(&self, ci_reference: &str, tree: &mut StateTree, expected: u64) -> EngineResult<u64> {
        if !tree.is_dirty() {
            tracing::debug!(ci = ci_reference, version = expected, "no changes to save");
            return Ok(expected);
        }
        let snapshot = to_snapshot(tree)?;
        self.store.save(ci_reference, &snapshot, expected)
    }
}
