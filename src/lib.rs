pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod presentation;

pub use cli::{Cli, run};
