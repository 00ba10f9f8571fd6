//! Capability model, host slot, and the authorization guard over them.

mod auth;
mod host;
mod profile;

pub use auth::{authorize, Denied};
pub use host::HostSlot;
pub use profile::{Capability, MemberProfile};
