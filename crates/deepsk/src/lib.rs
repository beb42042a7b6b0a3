//! Umbrella crate for DeepSK.
//!
//! Re-exports the game core, the record store and the wire types so
//! downstream code can depend on a single crate name (`deepsk`).

pub use deepsk_engine as engine;
pub use deepsk_game as game;
pub use deepsk_protocol as protocol;
