mod account;
mod entry;
mod integrity;
mod money;
mod transfer;
mod user;

pub use account::*;
pub use entry::*;
pub use integrity::*;
pub use money::*;
pub use transfer::*;
pub use user::*;
