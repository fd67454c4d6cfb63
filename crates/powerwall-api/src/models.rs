// Gateway response models
//
// `Aggregates` is decoded in two phases: first into a generic
// circuit -> metric -> value tree, then flattened into `circuit_metric`
// keys. Values are copied unchanged, so numbers stay numbers and
// timestamps stay strings.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::endpoint::Endpoint;
use crate::error::Error;

/// Per-circuit meter readings (`site`, `battery`, `load`, `solar`, ...)
/// flattened into a single field map.
///
/// Every metric of every circuit appears exactly once, keyed
/// `"<circuit>_<metric>"`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Aggregates {
    values: BTreeMap<String, Value>,
}

impl Aggregates {
    /// Decode a raw `/api/meters/aggregates` body.
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        <Self as Endpoint>::decode(body)
    }

    /// Flatten a circuit -> metric tree.
    ///
    /// Metric values must be JSON scalars. A flattened key produced twice
    /// (`a` + `b_c` vs `a_b` + `c`) is rejected instead of overwritten.
    pub fn flatten(circuits: BTreeMap<String, Map<String, Value>>) -> Result<Self, String> {
        let mut values = BTreeMap::new();

        for (circuit, metrics) in circuits {
            for (metric, value) in metrics {
                if value.is_array() || value.is_object() {
                    return Err(format!(
                        "metric {circuit}.{metric} is not a scalar value"
                    ));
                }

                let key = format!("{circuit}_{metric}");
                match values.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                    Entry::Occupied(slot) => {
                        return Err(format!("flattened key {} is ambiguous", slot.key()));
                    }
                }
            }
        }

        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Numeric field, if present and a number.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }
}

impl<'de> Deserialize<'de> for Aggregates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let circuits = BTreeMap::<String, Map<String, Value>>::deserialize(deserializer)?;
        Self::flatten(circuits).map_err(D::Error::custom)
    }
}

/// Battery state of energy, as a percentage (nominally 0-100).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateOfEnergy {
    pub percentage: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    const AGGREGATES: &str = r#"{
      "site": {
        "last_communication_time": "2021-03-12T12:20:53.69041677-08:00",
        "instant_power": -13,
        "instant_reactive_power": 37,
        "instant_apparent_power": 39.21734310225516,
        "frequency": 0,
        "energy_exported": 7791.304498571379,
        "energy_imported": 427428.2160958259,
        "timeout": 1500000000
      },
      "battery": {
        "last_communication_time": "2021-03-12T12:20:53.690236531-08:00",
        "instant_power": -3260,
        "instant_reactive_power": 20,
        "frequency": 60.010999999999996,
        "timeout": 1500000000
      },
      "load": {
        "instant_power": 764.25,
        "instant_reactive_power": 2.75
      },
      "solar": {
        "instant_power": 4022,
        "instant_reactive_power": -28
      }
    }"#;

    #[test]
    fn flattens_every_metric_of_every_circuit() {
        let aggregates = Aggregates::from_slice(AGGREGATES.as_bytes()).unwrap();

        let source: BTreeMap<String, Map<String, Value>> =
            serde_json::from_str(AGGREGATES).unwrap();
        let expected: usize = source.values().map(Map::len).sum();
        assert_eq!(aggregates.len(), expected);

        for (circuit, metrics) in &source {
            for (metric, value) in metrics {
                assert_eq!(aggregates.get(&format!("{circuit}_{metric}")), Some(value));
            }
        }
    }

    #[test]
    fn preserves_value_types() {
        let aggregates = Aggregates::from_slice(AGGREGATES.as_bytes()).unwrap();

        assert_eq!(aggregates.get_f64("battery_instant_reactive_power"), Some(20.0));
        assert_eq!(aggregates.get_f64("load_instant_power"), Some(764.25));
        assert_eq!(
            aggregates.get("site_last_communication_time"),
            Some(&json!("2021-03-12T12:20:53.69041677-08:00"))
        );
    }

    #[test]
    fn shared_metric_names_stay_distinct() {
        let body = json!({
            "site": { "instant_power": 1 },
            "solar": { "instant_power": 2 },
        });
        let aggregates = Aggregates::from_slice(body.to_string().as_bytes()).unwrap();

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates.get("site_instant_power"), Some(&json!(1)));
        assert_eq!(aggregates.get("solar_instant_power"), Some(&json!(2)));
    }

    #[test]
    fn empty_object_flattens_to_nothing() {
        let aggregates = Aggregates::from_slice(b"{}").unwrap();
        assert!(aggregates.is_empty());
    }

    #[test]
    fn rejects_non_object_circuit() {
        let err = Aggregates::from_slice(br#"{"site": 12}"#).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }

    #[test]
    fn rejects_non_object_top_level() {
        assert!(Aggregates::from_slice(b"[1, 2, 3]").is_err());
        assert!(Aggregates::from_slice(b"not json").is_err());
    }

    #[test]
    fn rejects_nested_metric_value() {
        let err = Aggregates::from_slice(br#"{"site": {"phases": {"a": 1}}}"#).unwrap_err();
        match err {
            Error::Deserialization { message, .. } => {
                assert!(message.contains("site.phases"), "unexpected message: {message}");
            }
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[test]
    fn rejects_ambiguous_flattened_keys() {
        let body = json!({
            "a": { "b_c": 1 },
            "a_b": { "c": 2 },
        });
        assert!(Aggregates::from_slice(body.to_string().as_bytes()).is_err());
    }

    #[test]
    fn serializes_as_flat_map() {
        let body = json!({ "battery": { "instant_power": -3260 } });
        let aggregates = Aggregates::from_slice(body.to_string().as_bytes()).unwrap();
        assert_eq!(
            serde_json::to_value(&aggregates).unwrap(),
            json!({ "battery_instant_power": -3260 })
        );
    }

    #[test]
    fn decodes_state_of_energy() {
        let soe: StateOfEnergy =
            serde_json::from_str("{\n  \"percentage\": 60.3277636547622\n}\n").unwrap();
        assert_eq!(soe.percentage, 60.327_763_654_762_2);
    }
}
