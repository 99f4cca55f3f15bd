mod event;
mod record;

pub use event::*;
pub use record::*;
