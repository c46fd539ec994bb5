//! Scoped store connections.

use crate::mongo::MongoContentStore;
use crate::traits::{ContentStore, StoreResult};
use atelier_core::StoreConfig;
use std::future::Future;
use std::sync::Arc;

/// Connect to MongoDB, verify the connection, run `pass`, then shut the client
/// down whatever `pass` returned.
///
/// Connection failures are returned before `pass` runs. Each call owns its own
/// client; nothing is shared between invocations.
pub async fn with_mongo_store<F, Fut, T>(config: &StoreConfig, pass: F) -> StoreResult<T>
where
    F: FnOnce(Arc<dyn ContentStore>) -> Fut,
    Fut: Future<Output = T>,
{
    let store = MongoContentStore::connect(config).await?;

    if let Err(e) = store.ping().await {
        tracing::error!(error = %e, "Content store unreachable");
        store.shutdown().await;
        return Err(e);
    }
    tracing::info!(
        collection = %config.collection,
        "Connected to content store"
    );

    let output = pass(Arc::new(store.clone())).await;

    store.shutdown().await;
    tracing::info!("Disconnected from content store");

    Ok(output)
}
