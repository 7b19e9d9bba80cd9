pub mod jwt;
pub mod password;
pub mod session;

pub use jwt::{extract_jwt_from_request, Claims, JwtGenerator};
pub use password::{hash_password, verify_password};
pub use session::SessionManager;
