//! Domain model types.

mod token;
mod user;

pub use token::AccessToken;
pub use user::{NewUser, User};
