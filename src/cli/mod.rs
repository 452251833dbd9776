pub mod dispatch;
pub mod types;

pub use dispatch::dispatch;
pub use types::{Cli, Commands};
