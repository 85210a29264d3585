pub mod controller;
pub mod cookie;
pub mod crud;
pub mod interface;
pub mod memory;
pub mod model;
pub mod routes;
pub mod schema;
pub mod service;

pub use interface::{AuthError, UserStore};
pub use routes::{admin_routes, auth_routes};
pub use service::AuthService;
