pub mod auth;
pub mod graphql;
pub mod guard;
pub mod upload;
