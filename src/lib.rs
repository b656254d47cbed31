//! Terminal client for the Openclaw gateway: polled caches, optimistic
//! stores and the `milo-dashboard` command surface.

pub mod cli;
pub mod core;
pub mod logging;
