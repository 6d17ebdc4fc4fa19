//! HTTP surface and Kubernetes collaborators for `arena serve`.

pub mod api;
pub mod config;
pub mod error;
pub mod handlers;
pub mod kube;
pub mod logging;
pub mod server;

pub use config::{KubeConfig, ServerConfig};
pub use error::ApiError;
pub use kube::KubeClient;
pub use logging::{LogFormat, init_tracing};
pub use server::{AppState, create_router};
