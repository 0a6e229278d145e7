// Feature engineering, projections and standings simulation over a
// normalized fantasy-football record store.

pub mod defense;
pub mod features;
pub mod leaders;
pub mod lineup;
pub mod pipeline;
pub mod projection;
pub mod rankings;
pub mod retro;
pub mod standings;
