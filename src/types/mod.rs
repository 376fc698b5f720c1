pub mod indicator;
pub mod signal;
pub mod stats;

pub use indicator::*;
pub use signal::*;
pub use stats::*;
