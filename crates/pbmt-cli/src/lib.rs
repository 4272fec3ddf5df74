pub mod commands;
pub mod fixture;
