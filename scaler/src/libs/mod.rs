pub mod backends;
mod helpers;
pub mod models;
pub mod policy;
mod scaler;

pub use scaler::{Mode, Scaler};
