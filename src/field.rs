//! Context fields attached to log records.
//!
//! A field value is a [`serde_json::Value`]: string, number, bool, null or a
//! nested array/object. Anything else is coerced at the call boundary, never
//! at render time, so rendering cannot fail.
//!
//! ```rust
//! use tsu_logging::{fields, Fields, IntoFields};
//!
//! let explicit: Fields = fields! { "user" => "alice", "attempt" => 3 };
//! let pairs = [("user", "alice")].into_fields();
//! assert_eq!(explicit["user"], pairs["user"]);
//! ```

use std::fmt;

use serde::Serialize;
pub use serde_json::Value;

/// An insertion-ordered map of field name to value.
pub type Fields = serde_json::Map<String, Value>;

/// Conversion into [`Fields`] for the `fields` argument of every logging call.
pub trait IntoFields {
    fn into_fields(self) -> Fields;
}

/// No fields: `logger.info("started", ())`.
impl IntoFields for () {
    fn into_fields(self) -> Fields {
        Fields::new()
    }
}

impl IntoFields for Fields {
    fn into_fields(self) -> Fields {
        self
    }
}

impl<K, V, const N: usize> IntoFields for [(K, V); N]
where
    K: Into<String>,
    V: Into<Value>,
{
    fn into_fields(self) -> Fields {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

impl<K, V> IntoFields for Vec<(K, V)>
where
    K: Into<String>,
    V: Into<Value>,
{
    fn into_fields(self) -> Fields {
        self.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
    }
}

/// Coerces any serializable value into a field value.
///
/// Values serde cannot represent as JSON (maps with non-string keys, failing
/// `Serialize` impls) fall back to their `Debug` string instead of erroring.
pub fn to_value<T>(value: &T) -> Value
where
    T: Serialize + fmt::Debug + ?Sized,
{
    serde_json::to_value(value).unwrap_or_else(|_| Value::String(format!("{value:?}")))
}

/// Coerces a value through its `Display` impl.
pub fn display<T: fmt::Display + ?Sized>(value: &T) -> Value {
    Value::String(value.to_string())
}

/// Builds [`Fields`] from `key => value` pairs, coercing each value with
/// [`to_value`].
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::field::to_value(&$value));
        )+
        fields
    }};
}
