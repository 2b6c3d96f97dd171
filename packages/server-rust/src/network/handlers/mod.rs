//! HTTP handlers of the control endpoint.
//!
//! The node itself is the router state; handlers receive it as
//! `State<Arc<SiteNode>>`.

pub mod control;

pub use control::control_handler;
