pub mod category;
pub mod template;
pub mod tree;

pub use category::{AssuranceLevel, CiCategory};
pub use template::{
    is_required_for_assurance, ActivityDef, AssuranceScoped, DeliverableDef, PhaseDef,
    ProcessTemplate, ReviewDef, SubPhaseDef, TemplateSummary,
};
pub use tree::{
    ActivityInstance, ActivityStatus, DataMap, PhaseInstance, PhaseStatus, StateTree,
    SubPhaseInstance,
};
