// crates/client/src/lib.rs
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod poller;
pub mod request;
pub mod store;

pub use api::*;
pub use auth::*;
pub use config::*;
pub use error::*;
pub use poller::*;
pub use request::*;
pub use store::*;
