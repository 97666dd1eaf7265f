//! Legacy source module - row structs and read-only accessor traits.

mod model;
mod traits;

pub use model::*;
pub use traits::{AuthorizationSource, FundsSource, KiidSource};
