//! The control endpoint: router, middleware and the listener lifecycle.

pub mod handlers;
pub mod middleware;
pub mod module;

pub use handlers::control_handler;
pub use module::ControlServer;
