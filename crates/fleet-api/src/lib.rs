// fleet-api: Async Rust client for remote cluster management endpoints

pub mod auth;
pub mod client;
pub mod error;
pub mod resource;
pub mod transport;

pub use auth::{ApiGroup, Credential};
pub use client::{ClusterClient, ServerVersion};
pub use error::Error;
pub use resource::{GroupClient, ListMeta, ObjectList, ObjectMeta, RemoteObject, ResourceApi};
pub use transport::{TlsMode, TransportConfig};
