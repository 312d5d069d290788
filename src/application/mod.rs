// Application layer: the unit-of-work executor, the operations it runs, and
// the service that exposes them to callers.

pub mod error;
mod executor;
mod service;
mod transfer;
mod user;

pub use error::*;
pub use executor::*;
pub use service::*;
pub use transfer::*;
pub use user::*;
