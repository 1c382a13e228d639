//! Query-string encoding and decoding.
//!
//! Encoding follows `encodeURIComponent`: every byte outside ASCII
//! alphanumerics and `- _ . ! ~ * ' ( )` is percent-encoded as UTF-8. The host
//! decodes with the same rules, so this set must not change.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

/// Ordered variable mapping sent to the host. `serde_json` is built with
/// `preserve_order`, so iteration follows insertion order.
pub type Variables = serde_json::Map<String, Value>;

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes one URL component.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Percent-decodes one URL component. Invalid UTF-8 is replaced rather than
/// rejected.
pub fn decode_component(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

/// Text form of a variable value as the host receives it.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Encodes `pairs` as `&key=value` segments, in order, without a leading `?`.
pub fn encode_pairs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = String::new();
    for (key, value) in pairs {
        out.push('&');
        out.push_str(&encode_component(key.as_ref()));
        out.push('=');
        out.push_str(&encode_component(value.as_ref()));
    }
    out
}

/// Encodes a variable mapping. An empty mapping yields an empty string.
pub fn encode(variables: &Variables) -> String {
    encode_pairs(variables.iter().map(|(k, v)| (k, stringify(v))))
}

/// A decoded query-string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Value(String),
    /// The key appeared without `=`; read as boolean true.
    Flag,
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Value(s) => Some(s),
            ParamValue::Flag => None,
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, ParamValue::Flag)
    }

    /// Text sent to the host when the value is forwarded as a variable.
    pub fn to_host_string(&self) -> String {
        match self {
            ParamValue::Value(s) => s.clone(),
            ParamValue::Flag => "true".to_string(),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Value(s) => serializer.serialize_str(s),
            ParamValue::Flag => serializer.serialize_bool(true),
        }
    }
}

/// Ordered, unique-keyed result of [`decode`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: Vec<(String, ParamValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: String, value: ParamValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'a> IntoIterator for &'a QueryParams {
    type Item = (&'a str, &'a ParamValue);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a ParamValue)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<(String, ParamValue)> for QueryParams {
    fn from_iter<T: IntoIterator<Item = (String, ParamValue)>>(iter: T) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for QueryParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Decodes a query string. Segments are split on `?` and `&`; each pair is
/// split on its first `=` only, so values may contain `=`. A key with no
/// value, or with nothing after its `=`, is a flag. Last occurrence of a key
/// wins.
pub fn decode(input: &str) -> QueryParams {
    input
        .split(['?', '&'])
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) if !value.is_empty() => {
                (decode_component(key), ParamValue::Value(decode_component(value)))
            }
            Some((key, _)) => (decode_component(key), ParamValue::Flag),
            None => (decode_component(segment), ParamValue::Flag),
        })
        .collect()
}
