//! Game-level logic: move notation, legality, records, and the game loop.

pub mod legality;
pub mod moves;
pub mod orchestrator;
pub mod record;
