pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod service;
pub mod system;
pub mod worker;
