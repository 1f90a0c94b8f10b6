mod replay;
mod root;

pub use replay::{replay, ReplayCommand, StackEntry, Step, StepReport};
pub use root::{Cli, Commands};
