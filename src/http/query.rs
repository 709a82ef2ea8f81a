//! Multi-valued URL query strings.
//!
//! Parsing and encoding follow `application/x-www-form-urlencoded` rules via
//! [`url::form_urlencoded`]: pairs are `&`-separated, `+` decodes to a space and
//! `%XX` sequences are percent-decoded.

use std::collections::BTreeMap;

use url::form_urlencoded;

/// A query string parsed into a mapping from parameter name to its values.
///
/// Names are kept in ascending byte order, so [`encode`](Self::encode) emits
/// parameters in a stable order regardless of how they arrived. Values keep
/// their arrival order until [`sort_values`](Self::sort_values) is called.
///
/// # Examples
///
/// ```
/// use rttp_cache::http::QueryParams;
///
/// let mut params = QueryParams::parse("tag=b&page=2&tag=a");
/// assert_eq!(params.get("tag"), Some("b"));
///
/// params.sort_values();
/// assert_eq!(params.encode(), "page=2&tag=a&tag=b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    inner: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a raw query string (without the leading `?`).
    ///
    /// A pair without `=` is recorded with an empty value. Empty pairs
    /// (`a=1&&b=2`) are skipped.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            params.append(name.into_owned(), value.into_owned());
        }
        params
    }

    /// Appends a value to the given parameter.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.entry(name.into()).or_default().push(value.into());
    }

    /// Returns the first value of the given parameter, or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values of the given parameter, in their current order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.inner.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if the parameter is present, even with an empty value.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Removes the parameter and all its values, returning them if it was present.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.inner.remove(name)
    }

    /// Sorts the values of every parameter independently.
    ///
    /// Parameter names are already ordered; only each value list changes.
    pub fn sort_values(&mut self) {
        for values in self.inner.values_mut() {
            values.sort_unstable();
        }
    }

    /// Returns the number of distinct parameter names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Encodes the parameters back into a query string (without the leading `?`).
    ///
    /// Names are emitted in ascending order and each value in its current
    /// position. An empty map encodes to an empty string.
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.inner {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_multi_value() {
        let params = QueryParams::parse("a=1&b=2&a=3");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get_all("a"), ["1", "3"]);
        assert_eq!(params.get("b"), Some("2"));
    }

    #[test]
    fn parse_decodes_plus_and_percent() {
        let params = QueryParams::parse("q=hello+world&path=%2Fdocs");
        assert_eq!(params.get("q"), Some("hello world"));
        assert_eq!(params.get("path"), Some("/docs"));
    }

    #[test]
    fn bare_name_has_empty_value() {
        let params = QueryParams::parse("refresh");
        assert!(params.contains("refresh"));
        assert_eq!(params.get("refresh"), Some(""));
    }

    #[test]
    fn empty_pairs_skipped() {
        assert!(QueryParams::parse("").is_empty());
        assert!(QueryParams::parse("&&").is_empty());
    }

    #[test]
    fn encode_orders_names_not_values() {
        let params = QueryParams::parse("z=2&a=9&z=1");
        assert_eq!(params.encode(), "a=9&z=2&z=1");
    }

    #[test]
    fn sort_values_per_parameter() {
        let mut params = QueryParams::parse("z=2&a=9&z=1");
        params.sort_values();
        assert_eq!(params.encode(), "a=9&z=1&z=2");
    }

    #[test]
    fn encode_escapes() {
        let mut params = QueryParams::new();
        params.append("q", "a b&c");
        assert_eq!(params.encode(), "q=a+b%26c");
    }

    #[test]
    fn remove() {
        let mut params = QueryParams::parse("a=1&refresh=1");
        assert_eq!(params.remove("refresh"), Some(vec!["1".to_string()]));
        assert!(params.remove("refresh").is_none());
        assert_eq!(params.encode(), "a=1");
    }
}
