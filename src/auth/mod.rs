//! Authentication: the account provider behind the sign-in pages and the
//! optional pre-shared key in front of the HTTP surface.

mod provider;
mod psk;

pub use provider::*;
pub use psk::*;
