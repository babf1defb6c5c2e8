pub mod base58;
pub mod codec;
pub mod curve;
pub mod error;
pub mod hash;
pub mod types;

pub use curve::{Curve, CurveError, Point};
pub use error::{BlockchainError, Result};
pub use hash::{target_threshold, Hash256};
