pub mod board;
pub mod placement;
pub mod sync;
