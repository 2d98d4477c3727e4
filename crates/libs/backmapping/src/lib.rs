#![deny(clippy::unwrap_used)]
#![allow(
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::many_single_char_names
)]

mod adapter;
mod error;
mod linear;
mod serializer;
mod transform;

pub use adapter::*;
pub use error::*;
pub use linear::*;
pub use serializer::*;
pub use transform::*;
