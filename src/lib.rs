pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod messaging;
pub mod utils;

pub use error::{Error, Result};
