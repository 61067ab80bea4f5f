pub mod runner;
pub mod terminator;

pub use runner::{ChildControl, ChildExit, ChildHandle, OutputPolicy, TerminationRequest, spawn};
pub use terminator::TimedTerminator;
