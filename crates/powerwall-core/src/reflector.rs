// ── Debug reflector ──
//
// Holds the latest readings and serves them back as one JSON object on
// every path. The poll loop is the only writer; any number of HTTP
// handlers read concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use powerwall_api::{Aggregates, StateOfEnergy};

use crate::error::CoreError;

/// Label of the aggregates reading.
pub const INVERTER: &str = "inverter";
/// Label of the state-of-energy reading.
pub const BATTERY: &str = "battery";

/// A reading held by the reflector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Inverter(Aggregates),
    Battery(StateOfEnergy),
}

/// In-memory mirror of the most recent readings.
///
/// Empty until the first [`replace`](Self::replace); afterwards it always
/// holds exactly the last snapshot handed in.
#[derive(Debug)]
pub struct Reflector<V = Reading> {
    state: RwLock<BTreeMap<String, V>>,
}

impl<V> Default for Reflector<V> {
    fn default() -> Self {
        Self {
            state: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<V: Serialize + Send + Sync + 'static> Reflector<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a whole new snapshot. The previous one is dropped.
    pub async fn replace(&self, snapshot: BTreeMap<String, V>) {
        let mut state = self.state.write().await;
        *state = snapshot;
    }

    /// Serialize the current snapshot under the read lock.
    pub async fn snapshot_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let state = self.state.read().await;
        serde_json::to_vec(&*state)
    }

    /// A router answering every request with the current snapshot.
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(serve_snapshot::<V>).with_state(self)
    }

    /// Serve on `listener` until `cancel` fires.
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), CoreError> {
        info!(addr = %listener.local_addr()?, "reflector listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;
        Ok(())
    }
}

impl Reflector<Reading> {
    /// Replace the snapshot with `{"inverter": ..., "battery": ...}`.
    pub async fn reflect(&self, aggregates: &Aggregates, soe: StateOfEnergy) {
        let mut snapshot = BTreeMap::new();
        snapshot.insert(INVERTER.to_owned(), Reading::Inverter(aggregates.clone()));
        snapshot.insert(BATTERY.to_owned(), Reading::Battery(soe));
        self.replace(snapshot).await;
    }
}

async fn serve_snapshot<V: Serialize + Send + Sync + 'static>(
    State(reflector): State<Arc<Reflector<V>>>,
) -> Response {
    match reflector.snapshot_json().await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            debug!(error = %e, "reflector snapshot not serializable");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serializer;
    use serde_json::{Value, json};

    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("meter offline"))
        }
    }

    #[tokio::test]
    async fn empty_reflector_serves_empty_object() {
        let reflector: Reflector = Reflector::new();
        let body = reflector.snapshot_json().await.unwrap();
        assert_eq!(body, b"{}");
    }

    #[tokio::test]
    async fn replace_discards_previous_snapshot() {
        let reflector: Reflector<Value> = Reflector::new();

        let mut first = BTreeMap::new();
        first.insert("a".to_owned(), json!(1));
        first.insert("b".to_owned(), json!(2));
        reflector.replace(first).await;

        let mut second = BTreeMap::new();
        second.insert("c".to_owned(), json!(3));
        reflector.replace(second).await;

        let body: Value = serde_json::from_slice(&reflector.snapshot_json().await.unwrap()).unwrap();
        assert_eq!(body, json!({ "c": 3 }));
    }

    #[tokio::test]
    async fn reflect_uses_fixed_labels() {
        let reflector: Reflector = Reflector::new();
        let aggregates =
            Aggregates::from_slice(br#"{"battery": {"instant_power": -3260}}"#).unwrap();
        reflector
            .reflect(&aggregates, StateOfEnergy { percentage: 42.5 })
            .await;

        let body: Value = serde_json::from_slice(&reflector.snapshot_json().await.unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "inverter": { "battery_instant_power": -3260 },
                "battery": { "percentage": 42.5 },
            })
        );
    }

    #[tokio::test]
    async fn unserializable_state_is_an_error() {
        let reflector: Reflector<Unserializable> = Reflector::new();
        let mut snapshot = BTreeMap::new();
        snapshot.insert("meter".to_owned(), Unserializable);
        reflector.replace(snapshot).await;

        let err = reflector.snapshot_json().await.unwrap_err();
        assert!(err.to_string().contains("meter offline"));
    }
}
