//! Backend module - destination entities and the store traits a session offers.

mod model;
mod traits;

pub use model::*;
pub use traits::*;
