pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod forms;
pub mod model;
pub mod output;
pub mod rental;
pub mod session;
pub mod state;

#[cfg(test)]
mod tests;
