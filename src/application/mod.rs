// Application layer - Channel lifecycle, scheduling and aggregation
pub mod aggregator;
pub mod channel;
pub mod clock;
pub mod command;
pub mod registry;
pub mod resync;
pub mod session;
pub mod sink;
pub mod transport;
pub mod unit_directory;

#[cfg(test)]
pub mod testing;
