mod catalog;
mod jobs;

pub use catalog::*;
pub use jobs::*;
