pub mod command;
pub mod wire;
