// ABOUTME: Domain types for blue/green switching.
// ABOUTME: Colors, validated names, priorities, and phantom-typed runtime ids.

mod color;
mod id;
mod name;
mod priority;

pub use color::{Color, ParseColorError};
pub use id::{ContainerId, ExecId};
pub use name::{AppName, NameError, ProjectName, ServiceName};
pub use priority::{Priority, PriorityGenerator};
