pub mod error;
pub mod rounding;
pub mod symbol;
pub mod traits;
pub mod types;

pub use error::*;
pub use rounding::*;
pub use symbol::*;
pub use traits::*;
pub use types::*;
