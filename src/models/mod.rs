//! Data models for the incidence tracker.
//!
//! Field names follow the document layout written by the mobile client.

mod classroom;
mod device;
mod incidence;
mod user;

pub use classroom::*;
pub use device::*;
pub use incidence::*;
pub use user::*;
