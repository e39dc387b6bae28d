//! Signal processing for reflector picking
pub mod filter;
pub mod threshold;

pub use threshold::{detect, Detection};
