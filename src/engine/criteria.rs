use crate::models::PhaseInstance;

/// Phase entry/exit policy consulted by the controller
///
/// The controller always enforces the structural exit rule (every activity
/// completed or skipped) itself; an evaluator only adds stricter gates.
pub trait CriteriaEvaluator {
    fn check_entry(&self, phase: &PhaseInstance) -> bool;
    fn check_exit(&self, phase: &PhaseInstance) -> bool;
}

/// Default policy: every gate is met
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysMet;

impl CriteriaEvaluator for AlwaysMet {
    fn check_entry(&self, _phase: &PhaseInstance) -> bool {
        true
    }

    fn check_exit(&self, _phase: &PhaseInstance) -> bool {
        true
    }
}

impl<T: CriteriaEvaluator + ?Sized> CriteriaEvaluator for &T {
    fn check_entry(&self, phase: &PhaseInstance) -> bool {
        (**self).check_entry(phase)
    }

    fn check_exit(&self, phase: &PhaseInstance) -> bool {
        (**self).check_exit(phase)
    }
}

impl<T: CriteriaEvaluator + ?Sized> CriteriaEvaluator for Box<T> {
    fn check_entry(&self, phase: &PhaseInstance) -> bool {
        (**self).check_entry(phase)
    }

    fn check_exit(&self, phase: &PhaseInstance) -> bool {
        (**self).check_exit(phase)
    }
}
