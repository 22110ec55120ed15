pub mod apps;
pub mod cache;
pub mod control;
pub mod enumerator;
pub mod platform;
pub mod process;
pub mod protection;
pub mod sampler;
pub mod snapshot;
