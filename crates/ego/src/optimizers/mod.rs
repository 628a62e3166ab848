//! Gradient ascent of acquisition functions from several start points

mod adam;
mod multistart;

pub use adam::AdamParams;
pub(crate) use adam::AdamState;
pub use multistart::*;
