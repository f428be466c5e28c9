pub mod assertion;
pub mod config;
pub mod models;
pub mod utils;

pub use self::assertion::*;
pub use self::config::*;
pub use self::utils::*;
