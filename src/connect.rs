use anyhow::Context;
use tokio_postgres::{Client, NoTls};

// Connect to PostgreSQL and drive the connection in the background
pub async fn connect(connection_string: &str) -> anyhow::Result<Client> {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
        .await
        .context("Failed to connect to PostgreSQL")?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("PostgreSQL connection error: {e}");
        }
    });

    Ok(client)
}
