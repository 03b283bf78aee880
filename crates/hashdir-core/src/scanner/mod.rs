pub mod dispatch;
pub mod walk;

pub use dispatch::{Dispatcher, FileOutcome};
pub use walk::{FileDescriptor, Traverser, WalkEvent};
