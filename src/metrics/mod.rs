mod prometheus;
mod sink;

pub use prometheus::*;
pub use sink::*;
