use crate::error::JaspeError;
use serde::de::DeserializeOwned;

/// Ordered multi-valued string map: the shape path captures, query pairs
/// and form pairs all share.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Values {
    pairs: Vec<(String, String)>,
}

impl Values {
    pub fn new() -> Self {
        Values::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Values {
            pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Parse an urlencoded string; malformed input yields an empty map.
    pub fn from_query(raw: &str) -> Values {
        Values::try_from_bytes(raw.as_bytes()).unwrap_or_default()
    }

    pub(crate) fn try_from_bytes(raw: &[u8]) -> Result<Values, serde_urlencoded::de::Error> {
        let text = std::str::from_utf8(raw).map_err(serde::de::Error::custom)?;
        check_escapes(text)?;
        serde_urlencoded::from_str::<Vec<(String, String)>>(text).map(|pairs| Values { pairs })
    }

    /// First value recorded under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Every value recorded under `key`, in insertion order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Record an additional value under `key`.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Replace every value recorded under `key` with a single one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs.push((key, value.into()));
    }

    pub fn extend(&mut self, other: Values) {
        self.pairs.extend(other.pairs);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Re-encode as an urlencoded string. String pairs always serialize.
    pub fn to_query(&self) -> String {
        serde_urlencoded::to_string(&self.pairs).unwrap_or_default()
    }
}

/// The pair decoder passes invalid escapes through literally; urlencoded
/// input forbids them, so reject upfront.
fn check_escapes(text: &str) -> Result<(), serde_urlencoded::de::Error> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2 && bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(serde::de::Error::custom(format!("invalid URL escape at byte {}", i)));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

/// Map flat key/value pairs onto the named fields of `T`.
///
/// Values round-trip through the urlencoded representation so anything serde
/// can pull out of a string (integers, floats, bools, options, ...) binds
/// directly. Mismatches fail with [`JaspeError::Binding`] carrying the
/// decoder's diagnosis of the first rejected entry.
pub fn bind<T: DeserializeOwned>(values: &Values) -> Result<T, JaspeError> {
    serde_urlencoded::from_str(&values.to_query()).map_err(JaspeError::Binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Filters {
        id: i64,
        verbose: bool,
    }

    #[test]
    fn values_keep_insertion_order_and_multiplicity() {
        let mut values = Values::new();
        values.append("tag", "a");
        values.append("tag", "b");
        values.append("page", "1");
        assert_eq!(values.get("tag"), Some("a"));
        assert_eq!(values.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
        values.set("tag", "c");
        assert_eq!(values.get_all("tag").collect::<Vec<_>>(), vec!["c"]);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn from_query_decodes_escapes_and_rejects_bad_ones() {
        let values = Values::from_query("a=1&b=x%20y");
        assert_eq!(values.get("b"), Some("x y"));
        assert!(Values::from_query("a=%zz").is_empty());
    }

    #[test]
    fn bind_converts_primitives() {
        let values = Values::from_pairs([("id", "42"), ("verbose", "true")]);
        let filters: Filters = bind(&values).unwrap();
        assert_eq!(filters, Filters { id: 42, verbose: true });
    }

    #[test]
    fn bind_names_a_missing_field() {
        let values = Values::from_pairs([("id", "42")]);
        let err = bind::<Filters>(&values).unwrap_err();
        match err {
            JaspeError::Binding(e) => assert!(e.to_string().contains("verbose")),
            other => panic!("expected a binding error, got {:?}", other),
        }
    }

    #[test]
    fn bind_rejects_a_type_mismatch() {
        let values = Values::from_pairs([("id", "forty-two"), ("verbose", "true")]);
        assert!(matches!(bind::<Filters>(&values), Err(JaspeError::Binding(_))));
    }
}
