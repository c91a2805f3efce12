//! Head-to-head wagers between two players of a room.

pub mod registry;
pub mod resolver;

pub use registry::{Challenge, DuelError, DuelRegistry};
pub use resolver::{DuelResolver, Parity, Resolution, ResolveError, Settlement, FORFEIT_TEXT};
