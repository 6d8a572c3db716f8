//! Service layer of the demo API. Every public method runs through
//! [`Interceptor::observe_service`](crate::monitor::Interceptor::observe_service),
//! so the default `..services` pattern picks them up.

pub mod products;
pub mod users;

use thiserror::Error;

pub use products::{Product, ProductService};
pub use users::{CreateUser, User, UserService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
}
