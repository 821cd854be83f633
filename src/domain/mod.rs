// Domain layer - Pure types and pure functions, no I/O
pub mod detector;
pub mod measurement;
pub mod units;
