pub mod net;
pub mod subsystem;
pub mod time;
pub mod workspace;

#[cfg(test)]
mod time_test;
