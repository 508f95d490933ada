pub mod net;

pub mod retry;
pub use retry::*;
