pub mod error;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod repository;
pub mod service;

pub use error::*;
pub use handlers::*;
pub use models::*;
pub use payment::*;
pub use repository::*;
pub use service::*;
