pub mod constants;
mod error;
pub mod utility;

pub use error::{Error, Result};
