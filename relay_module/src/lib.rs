//! WhatsApp webhook relay service with a small contact CRM.

pub mod config;
pub mod contact_store;
pub mod crm;
pub mod relay;
pub mod server;
pub mod verify;
pub mod webhook;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use config::{ConfigError, ServiceConfig};
pub use relay::MessageRelay;
pub use server::{build_router, run_server, AppState};
