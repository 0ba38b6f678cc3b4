//! Testing utilities including mock implementations.
//!
//! These let the services and the HTTP layer run without a live backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use supabase_client::{Result, SupabaseError};

use crate::domains::location::{IpLocator, LocationData};
use crate::domains::requests::{RequestRow, RequestWithDistance, SpatialBackend};

/// Canned outcome for a procedure or function.
enum MockOutcome {
    Data(Value),
    Error(SupabaseError),
}

impl MockOutcome {
    fn replay(&self) -> Result<Value> {
        match self {
            MockOutcome::Data(value) => Ok(value.clone()),
            MockOutcome::Error(e) => Err(clone_error(e)),
        }
    }
}

/// `SupabaseError` wraps non-cloneable sources upstream, so rebuild it field by field.
fn clone_error(e: &SupabaseError) -> SupabaseError {
    match e {
        SupabaseError::Config(m) => SupabaseError::Config(m.clone()),
        SupabaseError::Network(m) => SupabaseError::Network(m.clone()),
        SupabaseError::Timeout {
            operation,
            timeout_ms,
        } => SupabaseError::Timeout {
            operation: operation.clone(),
            timeout_ms: *timeout_ms,
        },
        SupabaseError::Api {
            status,
            code,
            message,
            details,
            hint,
        } => SupabaseError::Api {
            status: *status,
            code: *code,
            message: message.clone(),
            details: details.clone(),
            hint: hint.clone(),
        },
        SupabaseError::Parse(m) => SupabaseError::Parse(m.clone()),
    }
}

/// A mock backend for testing.
///
/// Procedures and functions without a configured outcome return `null`.
#[derive(Clone)]
pub struct MockBackend {
    rpc_outcomes: Arc<RwLock<HashMap<String, MockOutcome>>>,
    function_outcomes: Arc<RwLock<HashMap<String, MockOutcome>>>,
    connected: Arc<RwLock<bool>>,

    /// Call tracking for assertions
    rpc_calls: Arc<RwLock<Vec<(String, Value)>>>,
    function_calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            rpc_outcomes: Arc::default(),
            function_outcomes: Arc::default(),
            connected: Arc::new(RwLock::new(true)),
            rpc_calls: Arc::default(),
            function_calls: Arc::default(),
        }
    }

    pub fn with_rpc_response(self, function: impl Into<String>, data: Value) -> Self {
        self.rpc_outcomes
            .write()
            .unwrap()
            .insert(function.into(), MockOutcome::Data(data));
        self
    }

    pub fn with_rpc_error(self, function: impl Into<String>, error: SupabaseError) -> Self {
        self.rpc_outcomes
            .write()
            .unwrap()
            .insert(function.into(), MockOutcome::Error(error));
        self
    }

    pub fn with_function_response(self, name: impl Into<String>, data: Value) -> Self {
        self.function_outcomes
            .write()
            .unwrap()
            .insert(name.into(), MockOutcome::Data(data));
        self
    }

    pub fn with_function_error(self, name: impl Into<String>, error: SupabaseError) -> Self {
        self.function_outcomes
            .write()
            .unwrap()
            .insert(name.into(), MockOutcome::Error(error));
        self
    }

    pub fn with_connection(self, connected: bool) -> Self {
        self.set_connected(connected);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        *self.connected.write().unwrap() = connected;
    }

    /// Procedures called so far, with their parameters.
    pub fn rpc_calls(&self) -> Vec<(String, Value)> {
        self.rpc_calls.read().unwrap().clone()
    }

    pub fn function_calls(&self) -> Vec<String> {
        self.function_calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SpatialBackend for MockBackend {
    async fn call_rpc(&self, function: &str, params: Value) -> Result<Value> {
        self.rpc_calls
            .write()
            .unwrap()
            .push((function.to_string(), params));

        self.rpc_outcomes
            .read()
            .unwrap()
            .get(function)
            .map(MockOutcome::replay)
            .unwrap_or(Ok(Value::Null))
    }

    async fn invoke_function(&self, name: &str) -> Result<Value> {
        self.function_calls.write().unwrap().push(name.to_string());

        self.function_outcomes
            .read()
            .unwrap()
            .get(name)
            .map(MockOutcome::replay)
            .unwrap_or(Ok(Value::Null))
    }

    async fn check_connection(&self) -> bool {
        *self.connected.read().unwrap()
    }
}

/// An IP locator that resolves every public caller to a fixed location.
#[derive(Clone)]
pub struct StubLocator {
    location: LocationData,
    seen: Arc<RwLock<Vec<Option<IpAddr>>>>,
}

impl StubLocator {
    pub fn new(location: LocationData) -> Self {
        Self {
            location,
            seen: Arc::default(),
        }
    }

    /// Addresses passed to [`IpLocator::locate`], in order.
    pub fn seen(&self) -> Vec<Option<IpAddr>> {
        self.seen.read().unwrap().clone()
    }
}

#[async_trait]
impl IpLocator for StubLocator {
    async fn locate(&self, ip: Option<IpAddr>) -> LocationData {
        self.seen.write().unwrap().push(ip);
        match ip {
            Some(_) => self.location.clone(),
            None => LocationData::fallback(),
        }
    }
}

/// A full procedure row at the given position.
pub fn sample_row(latitude: f64, longitude: f64) -> Value {
    json!({
        "id": Uuid::new_v4(),
        "user_id": Uuid::new_v4(),
        "title": "Garden tools to give away",
        "description": "Rake, shovel and gloves",
        "category": "free-stuff",
        "subcategory": "garden",
        "duration_estimate": "1hour",
        "skills_required": null,
        "compensation": null,
        "images": [],
        "location": { "latitude": latitude, "longitude": longitude },
        "status": "active",
        "created_at": "2024-05-01T12:00:00Z",
        "updated_at": "2024-05-01T12:00:00Z",
        "expires_at": null,
        "distance_meters": null,
        "user_full_name": "Alex Kim",
        "user_avatar_url": null,
        "user_email": null
    })
}

/// A reshaped request at the given position.
pub fn sample_request(latitude: f64, longitude: f64) -> RequestWithDistance {
    let row: RequestRow =
        serde_json::from_value(sample_row(latitude, longitude)).expect("sample row decodes");
    RequestWithDistance::from(row)
}
