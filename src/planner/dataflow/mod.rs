//! Dataflow planning - converts a resolved query into an operator tree.

mod builder;
mod id;
mod plan;

pub use builder::DataflowPlanBuilder;
pub use id::{IdGenerator, NodeId};
pub use plan::*;
