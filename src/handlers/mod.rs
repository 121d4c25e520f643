pub mod health;
pub mod doc_get;
pub mod doc_create;
pub mod doc_update;
pub mod doc_subscribe;

pub use health::*;
pub use doc_get::*;
pub use doc_create::*;
pub use doc_update::*;
pub use doc_subscribe::*;
