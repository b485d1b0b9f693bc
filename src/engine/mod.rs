//! Engine process lifecycle: port allocation, supervision, scoped handles.

pub mod handle;
pub mod port;
pub mod process;
pub mod supervisor;
