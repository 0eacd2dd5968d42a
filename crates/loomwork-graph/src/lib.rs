//! Graph construction and validation: turns declared stages of factory
//! descriptors into a validated [`dag::ExecutionPlan`], with an optional
//! rewriting pass before dispatch.

pub mod dag;
pub mod inspector;
pub mod optimizer;

pub use dag::{DagError, Edge, ExecutionPlan, Node, StageSpec};
pub use inspector::PipelineInspector;
pub use optimizer::{IdentityOptimizer, MergeIndependentStages, PipelineOptimizer};
