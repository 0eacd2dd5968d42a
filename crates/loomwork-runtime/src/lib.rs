//! Runtime dispatch and execution: the deliverable dispatcher, stages, and
//! the top-level pipeline driver.

pub mod cancel;
pub mod dispatcher;
pub mod pipeline;
pub mod stage;

pub use cancel::CancelToken;
pub use dispatcher::DeliverableDispatcher;
pub use pipeline::{Pipeline, PipelineState};
pub use stage::Stage;
