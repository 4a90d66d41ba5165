pub mod api;
pub mod config;
pub mod custom_router;
pub mod dynamic_router;
pub mod error;
pub mod events;
pub mod health;
pub mod router_group;
pub mod routing;
pub mod state;
pub mod version;

pub use axum;
pub use reqwest;
pub use serde;
pub use serde_json;
