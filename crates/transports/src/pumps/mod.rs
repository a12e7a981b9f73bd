//! Per-connection WebSocket pumps.
//!
//! One session runs all three inside a single `select!`; whichever exits
//! first ends the session.

pub(crate) mod ping;
pub(crate) mod read;
pub(crate) mod write;
