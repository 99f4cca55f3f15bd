mod batch;
mod input;
mod load;
mod pipeline;
mod sink;

pub use batch::*;
pub use input::*;
pub use load::*;
pub use pipeline::*;
pub use sink::*;
