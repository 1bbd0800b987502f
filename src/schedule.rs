pub mod present;
pub mod scheduler;
