pub mod config;
pub mod flags;
pub mod redis_bus;

pub use config::ServiceConfig;
pub use flags::{EnvFlags, StaticFlags};
pub use redis_bus::RedisBus;
