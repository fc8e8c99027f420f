//! UCI engine process handling.
//!
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based line framing
//!   with a maximum line length.
//! - `supervisor`: process spawning, stream ownership, and idempotent
//!   termination.
//! - `session`: the handshake and turn-taking state machine.

pub mod codec;
pub mod session;
pub mod supervisor;
