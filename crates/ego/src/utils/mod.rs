mod misc;
mod start_points;

pub use misc::*;
pub use start_points::*;
