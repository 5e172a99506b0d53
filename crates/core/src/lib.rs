pub mod config;
pub mod error;
pub mod notification;
pub mod prediction;
pub mod subscription;

pub use config::Config;
pub use error::*;
pub use notification::*;
pub use prediction::*;
pub use subscription::*;
