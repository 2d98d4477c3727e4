#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]

mod codec;
mod error;
mod gro;
mod pdb;
mod registry;
mod structure;

pub use codec::*;
pub use error::*;
pub use gro::*;
pub use pdb::*;
pub use registry::*;
pub use structure::*;
