pub mod account;
pub mod password;
pub mod token;

pub use account::{AccountError, AccountService};
pub use token::{Claims, TokenError};
