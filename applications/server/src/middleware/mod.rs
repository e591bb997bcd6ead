/// Request middleware
pub mod session;

pub use session::{session_cookies, Session};
