//! Request handlers for user operations.

mod users;

pub use users::*;
