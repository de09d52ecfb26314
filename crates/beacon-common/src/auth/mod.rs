//! Token signing for channel authorization, signin, and REST requests

mod signature;
mod token;

pub use signature::{body_md5, sign_request, string_to_sign, verify_request};
pub use token::Token;
