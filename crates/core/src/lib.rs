// crates/core/src/lib.rs
pub mod error;
pub mod naming;
pub mod ocr;
pub mod store;

pub use error::*;
pub use naming::*;
pub use ocr::*;
pub use store::*;
