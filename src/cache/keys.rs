//! Cache key and tag definitions.
//!
//! Keys are deterministic strings of the form `prefix:name:value|name:value`,
//! where values are canonical JSON. Tags are the unit of invalidation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::CacheError;

/// Entity family owning a slice of the key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Booking,
    Vehicle,
    Customer,
    Dashboard,
    Invoice,
    Payment,
    Payout,
    Expense,
    Maintenance,
    Report,
}

impl Namespace {
    pub const ALL: [Namespace; 10] = [
        Namespace::Booking,
        Namespace::Vehicle,
        Namespace::Customer,
        Namespace::Dashboard,
        Namespace::Invoice,
        Namespace::Payment,
        Namespace::Payout,
        Namespace::Expense,
        Namespace::Maintenance,
        Namespace::Report,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Booking => "booking",
            Namespace::Vehicle => "vehicle",
            Namespace::Customer => "customer",
            Namespace::Dashboard => "dashboard",
            Namespace::Invoice => "invoice",
            Namespace::Payment => "payment",
            Namespace::Payout => "payout",
            Namespace::Expense => "expense",
            Namespace::Maintenance => "maintenance",
            Namespace::Report => "report",
        }
    }

    /// Resolve a key prefix such as `vehicle` or `vehicles`.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let singular = prefix.strip_suffix('s').unwrap_or(prefix);
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == prefix || ns.as_str() == singular)
    }

    /// Freshness window used when a caller does not pick one.
    ///
    /// Volatile data (bookings, dashboards) gets short windows; reference data
    /// and reports get longer ones.
    pub fn default_ttl(self) -> Duration {
        let seconds = match self {
            Namespace::Booking => 60,
            Namespace::Dashboard => 120,
            Namespace::Invoice | Namespace::Payment | Namespace::Payout | Namespace::Expense => {
                180
            }
            Namespace::Vehicle
            | Namespace::Customer
            | Namespace::Maintenance
            | Namespace::Report => 300,
        };
        Duration::from_secs(seconds)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalidation handle attached to cache entries at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    /// Everything cached under a namespace: listings, aggregates and details.
    Namespace(Namespace),
    /// Entries derived from one specific entity.
    Entity(Namespace, String),
    /// Entries personalised for one back-office user.
    User(String),
}

impl Tag {
    pub fn entity(namespace: Namespace, id: impl fmt::Display) -> Self {
        Self::Entity(namespace, id.to_string())
    }

    pub fn user(id: impl fmt::Display) -> Self {
        Self::User(id.to_string())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Namespace(ns) => write!(f, "ns:{ns}"),
            Tag::Entity(ns, id) => write!(f, "{ns}#{id}"),
            Tag::User(id) => write!(f, "user#{id}"),
        }
    }
}

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wrap an already-built key string, e.g. one reported by `stats()`.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespace named by the key's prefix, if it is a known one.
    pub fn namespace(&self) -> Option<Namespace> {
        let prefix = self.0.split_once(':').map_or(self.0.as_str(), |(head, _)| head);
        Namespace::from_prefix(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query parameters contributing to a key.
///
/// Absent values (`None`, JSON `null`) are dropped so that a filter that was
/// not supplied and a filter explicitly left empty map to the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyParams {
    fields: BTreeMap<String, Value>,
}

impl KeyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        let value = strip_nulls(value.into());
        if !value.is_null() {
            self.fields.insert(name.to_string(), value);
        }
        self
    }

    pub fn with_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    /// Flatten a serializable filter struct into parameters, one per field.
    pub fn from_serializable<T: Serialize>(filter: &T) -> Result<Self, CacheError> {
        let value =
            serde_json::to_value(filter).map_err(|err| CacheError::KeyParams(err.to_string()))?;
        match value {
            Value::Object(map) => Ok(map
                .into_iter()
                .fold(Self::new(), |params, (name, value)| params.with(&name, value))),
            Value::Null => Ok(Self::new()),
            other => Err(CacheError::KeyParams(format!(
                "expected an object of filters, got `{other}`"
            ))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Build a deterministic key from a prefix and parameters.
///
/// Parameter order, and object key order inside values, never affect the
/// result.
pub fn build_key(prefix: &str, params: &KeyParams) -> CacheKey {
    if params.is_empty() {
        return CacheKey(format!("{prefix}:{{}}"));
    }

    let suffix = params
        .fields
        .iter()
        .map(|(name, value)| format!("{name}:{}", canonical_json(value)))
        .collect::<Vec<_>>()
        .join("|");
    CacheKey(format!("{prefix}:{suffix}"))
}

/// Key for the detail view of a single entity.
pub fn entity_key(namespace: Namespace, id: impl fmt::Display) -> CacheKey {
    build_key(
        namespace.as_str(),
        &KeyParams::new().with("id", id.to_string()),
    )
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter_map(|(name, value)| {
                    let value = strip_nulls(value);
                    (!value.is_null()).then_some((name, value))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let body = entries
                .into_iter()
                .map(|(name, value)| {
                    format!("{}:{}", Value::String(name.clone()), canonical_json(value))
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{body}}}")
        }
        Value::Array(items) => {
            let body = items
                .iter()
                .map(canonical_json)
                .collect::<Vec<_>>()
                .join(",");
            format!("[{body}]")
        }
        scalar => scalar.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parameter_order_does_not_change_key() {
        let forward = KeyParams::new().with("a", 1).with("b", 2);
        let backward = KeyParams::new().with("b", 2).with("a", 1);

        assert_eq!(build_key("x", &forward), build_key("x", &backward));
        assert_eq!(build_key("x", &forward).as_str(), "x:a:1|b:2");
    }

    #[test]
    fn key_prefix_resolves_namespace() {
        assert_eq!(
            CacheKey::from_raw("vehicles:{}").namespace(),
            Some(Namespace::Vehicle)
        );
        assert_eq!(
            CacheKey::from_raw("dashboard:user:\"u1\"").namespace(),
            Some(Namespace::Dashboard)
        );
        assert_eq!(CacheKey::from_raw("booking").namespace(), Some(Namespace::Booking));
        assert_eq!(CacheKey::from_raw("financial:{}").namespace(), None);
    }

    #[test]
    fn nested_object_order_is_canonical() {
        let first = KeyParams::new().with("range", json!({"from": "2024-01-01", "to": "2024-02-01"}));
        let second =
            KeyParams::new().with("range", json!({"to": "2024-02-01", "from": "2024-01-01"}));

        assert_eq!(build_key("booking", &first), build_key("booking", &second));
    }

    #[test]
    fn absent_filters_are_omitted() {
        let without = KeyParams::new().with("page", 1);
        let with_none = KeyParams::new()
            .with("page", 1)
            .with_opt::<String>("status", None)
            .with("search", Value::Null);

        assert_eq!(build_key("vehicle", &without), build_key("vehicle", &with_none));
    }

    #[test]
    fn empty_params_use_fixed_suffix() {
        assert_eq!(build_key("vehicle", &KeyParams::new()).as_str(), "vehicle:{}");
    }

    #[test]
    fn distinct_values_produce_distinct_keys() {
        let available = KeyParams::new().with("status", "available");
        let rented = KeyParams::new().with("status", "rented");
        assert_ne!(build_key("vehicle", &available), build_key("vehicle", &rented));

        // A string "1" and a number 1 are different filters.
        let text = KeyParams::new().with("page", "1");
        let number = KeyParams::new().with("page", 1);
        assert_ne!(build_key("vehicle", &text), build_key("vehicle", &number));
    }

    #[test]
    fn from_serializable_flattens_struct_fields() {
        #[derive(Serialize)]
        struct Filter {
            status: Option<&'static str>,
            page: u32,
            search: Option<String>,
        }

        let params = KeyParams::from_serializable(&Filter {
            status: Some("available"),
            page: 2,
            search: None,
        })
        .expect("filter serializes");

        assert_eq!(
            build_key("vehicle", &params).as_str(),
            r#"vehicle:page:2|status:"available""#
        );
    }

    #[test]
    fn from_serializable_rejects_scalars() {
        let err = KeyParams::from_serializable(&42).unwrap_err();
        assert!(matches!(err, CacheError::KeyParams(_)));
    }

    #[test]
    fn entity_keys_embed_the_id() {
        assert_eq!(
            entity_key(Namespace::Booking, "b-1").as_str(),
            r#"booking:id:"b-1""#
        );
    }

    #[test]
    fn tags_render_readably() {
        assert_eq!(Tag::Namespace(Namespace::Vehicle).to_string(), "ns:vehicle");
        assert_eq!(Tag::entity(Namespace::Customer, "c9").to_string(), "customer#c9");
        assert_eq!(Tag::user("u1").to_string(), "user#u1");
    }

    #[test]
    fn every_namespace_has_a_positive_default_ttl() {
        for ns in Namespace::ALL {
            assert!(ns.default_ttl() > Duration::ZERO, "{ns} has no ttl");
        }
    }
}
