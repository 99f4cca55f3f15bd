mod failable_backend;
mod helpers;

pub use failable_backend::*;
pub use helpers::*;
