//! A small ordered header map: insertion order is preserved for iteration
//! (so `Response.headers` reflects wire order), lookups are ASCII
//! case-insensitive, and setting an existing key overwrites its value in
//! place rather than appending a duplicate.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets a header, overwriting any existing value for the same name
    /// (case-insensitively) while keeping its original position, or
    /// appending a new entry with the name as given.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Sets a header only if it is not already present.
    pub fn set_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if !self.contains(name) {
            self.set(name.to_string(), value);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges `other` on top of `self`: entries in `other` overwrite entries
    /// in `self` with the same name; entries only in `self` are kept.
    pub fn merged_with(&self, other: &HeaderMap) -> HeaderMap {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.set(k.to_string(), v.to_string());
        }
        merged
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeaderMap {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.set(k.to_string(), v.to_string());
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_writer_wins_case_insensitively() {
        let mut headers = HeaderMap::new();
        headers.set("Content-Type", "text/plain");
        headers.set("content-type", "application/json");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn set_if_absent_does_not_overwrite() {
        let mut headers = HeaderMap::new();
        headers.set("Host", "example.com");
        headers.set_if_absent("host", "other.com");
        assert_eq!(headers.get("Host"), Some("example.com"));
    }

    #[test]
    fn merge_prefers_overlay() {
        let base = HeaderMap::from([("X-A", "1"), ("X-B", "2")]);
        let overlay = HeaderMap::from([("X-B", "3"), ("X-C", "4")]);
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.get("X-A"), Some("1"));
        assert_eq!(merged.get("X-B"), Some("3"));
        assert_eq!(merged.get("X-C"), Some("4"));
    }
}
