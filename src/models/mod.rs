pub mod control;
pub mod document;
pub mod error;
pub mod health;
pub mod presence;
pub mod ready;

pub use control::*;
pub use document::*;
pub use error::*;
pub use health::*;
pub use presence::*;
pub use ready::*;
