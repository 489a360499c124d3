//! Ordered call parameter bag

use std::fmt;

use crate::constants::ACCESS_TOKEN_PARAM;
use crate::json::join_non_empty;

/// Method parameters in insertion order, as sent in the form body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VkParameters {
    entries: Vec<(String, String)>,
}

impl VkParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set `key` only if it is not present. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.contains_key(key) {
            return false;
        }
        self.entries.push((key.to_string(), value.into()));
        true
    }

    /// Builder form of `insert`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Booleans are sent as `1`/`0`.
    pub fn insert_bool(&mut self, key: impl Into<String>, value: bool) {
        self.insert(key, if value { "1" } else { "0" });
    }

    /// Comma-joined list, blank items skipped. An empty list inserts nothing.
    pub fn insert_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = join_non_empty(values, ",");
        if !joined.is_empty() {
            self.insert(key, joined);
        }
    }

    /// Insert the value's string form if it is `Some`.
    pub fn insert_opt<T: ToString>(&mut self, key: impl Into<String>, value: Option<T>) {
        if let Some(value) = value {
            self.insert(key, value.to_string());
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Form fields for the transport.
    pub fn as_form(&self) -> &[(String, String)] {
        &self.entries
    }

    /// `key=value` pairs for logs, without the access token.
    pub fn loggable(&self) -> Loggable<'_> {
        Loggable(self)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VkParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Display adapter returned by `VkParameters::loggable`.
pub struct Loggable<'a>(&'a VkParameters);

impl fmt::Display for Loggable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.0.iter() {
            if key == ACCESS_TOKEN_PARAM {
                continue;
            }
            if !first {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}
