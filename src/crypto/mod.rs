pub mod password;
pub mod token;

pub use password::{generate_salt, hash_password, verify_password};
pub use token::{issue_access_token, resolve_user_id, Claims};
