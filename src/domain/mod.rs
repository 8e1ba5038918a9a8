// Domain layer - Pure types and rules, no I/O
pub mod metrics;
pub mod unit;
pub mod window;
