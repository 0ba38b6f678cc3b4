//! Seam between the spatial services and the backend that owns the data.

use async_trait::async_trait;
use serde_json::Value;
use supabase_client::{Result, SupabaseClient};

/// Remote procedures, edge functions and health of the backend.
///
/// Implemented by [`SupabaseClient`]; tests use [`crate::testing::MockBackend`].
#[async_trait]
pub trait SpatialBackend: Send + Sync {
    /// Call a database procedure with named JSON parameters.
    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value>;

    /// Invoke an edge function without a body.
    async fn invoke_function(&self, name: &str) -> Result<Value>;

    async fn check_connection(&self) -> bool;
}

#[async_trait]
impl SpatialBackend for SupabaseClient {
    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value> {
        self.rpc(function, &params).await
    }

    async fn invoke_function(&self, name: &str) -> Result<Value> {
        SupabaseClient::invoke_function::<Value, Value>(self, name, None).await
    }

    async fn check_connection(&self) -> bool {
        SupabaseClient::check_connection(self).await
    }
}
