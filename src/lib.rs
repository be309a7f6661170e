mod common;
mod constrained;
mod error;
mod library;
mod population;
mod progress;
mod raw;
mod snopt7;
mod sparsity;
#[cfg(test)]
mod tests;
mod traits;
mod worhp;

pub use common::*;
pub use constrained::*;
pub use error::*;
pub use population::*;
pub use snopt7::{describe_result, Snopt7};
pub use sparsity::*;
pub use traits::*;
pub use worhp::{Worhp, WORHP_MAJOR, WORHP_MINOR};
