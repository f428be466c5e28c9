pub mod instance;
pub mod session;

pub use instance::*;
pub use session::*;
