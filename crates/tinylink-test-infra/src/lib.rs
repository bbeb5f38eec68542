//! Disposable backing services for integration tests.

pub mod error;
pub mod mysql;
pub mod redis;

pub use error::{Result, TestInfraError};

use testcontainers::{ContainerAsync, GenericImage};

/// Host address of a started container, with `localhost` pinned to IPv4.
pub(crate) async fn container_host(container: &ContainerAsync<GenericImage>) -> Result<String> {
    let host = container.get_host().await?.to_string();
    Ok(match host.as_str() {
        "localhost" => String::from("127.0.0.1"),
        _ => host,
    })
}
