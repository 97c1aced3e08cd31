mod dirty;
mod drain;

pub use dirty::DirtyList;
pub use drain::{DisconnectDrainQueue, DrainEntry};
