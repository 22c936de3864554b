//! Command implementations for ecupatch

pub mod analyze;
pub mod compare;
pub mod patch;
pub mod tables;
pub mod verify;

pub use analyze::analyze;
pub use compare::compare;
pub use patch::{patch, PatchArgs};
pub use tables::{regions, stages};
pub use verify::verify;
