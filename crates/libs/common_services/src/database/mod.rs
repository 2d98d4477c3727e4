mod catalog;
mod error;
mod jobs;
mod utils;

pub use catalog::*;
pub use error::*;
pub use jobs::*;
pub use utils::*;
