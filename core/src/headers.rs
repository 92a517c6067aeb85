//! Case-insensitive header multimap.
//!
//! Entries are looked up by their lowercase name while the name given at
//! first insertion is kept for wire formatting. Insertion order is
//! preserved so projected header lines come out in the order they were set.

/// One header name with its ordered values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    name: String,
    values: Vec<String>,
}

/// Ordered mapping from header name to one or more values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<Entry>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = name.to_ascii_lowercase();
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Values for `name`, empty when absent.
    pub fn get(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|i| self.entries[i].values.as_slice())
            .unwrap_or_default()
    }

    /// Values joined with `,`; empty when absent.
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(",")
    }

    /// Replace all values of `name`. Keeps the original position and casing
    /// when the header already exists.
    pub fn set<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        match self.position(name) {
            Some(i) => self.entries[i].values = values,
            None => self.entries.push(Entry {
                key: name.to_ascii_lowercase(),
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Append values to `name`, creating it when absent.
    pub fn append<I, V>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        match self.position(name) {
            Some(i) => self.entries[i].values.extend(values.into_iter().map(Into::into)),
            None => self.set(name, values),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.position(name).map(|i| self.entries.remove(i).values)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(name, values)` pairs in insertion order, names in original casing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|e| (e.name.as_str(), e.values.as_slice()))
    }

    /// Header names in original casing.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), [value]);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.set("Host", ["x"]);
        assert_eq!(headers.get("Host"), ["x"]);
        assert_eq!(headers.get("host"), ["x"]);
        assert!(headers.contains("HOST"));
    }

    #[test]
    fn set_replaces_and_keeps_first_casing() {
        let mut headers = Headers::new();
        headers.set("Content-Type", ["text/plain"]);
        headers.set("content-type", ["application/json"]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("CONTENT-TYPE"), ["application/json"]);
        assert_eq!(headers.names().collect::<Vec<_>>(), ["Content-Type"]);
    }

    #[test]
    fn append_extends_existing_values() {
        let mut headers = Headers::new();
        headers.set("Accept", ["text/html", "application/xml;q=0.9"]);
        headers.append("accept", ["image/png"]);
        assert_eq!(headers.get("Accept"), ["text/html", "application/xml;q=0.9", "image/png"]);
        assert_eq!(headers.line("Accept"), "text/html,application/xml;q=0.9,image/png");

        headers.append("Test", ["yes"]);
        assert_eq!(headers.get("test"), ["yes"]);
    }

    #[test]
    fn remove_and_missing() {
        let mut headers = Headers::new();
        headers.set("Test", ["yes"]);
        assert_eq!(headers.remove("TEST"), Some(vec!["yes".to_string()]));
        assert!(!headers.contains("Test"));
        assert!(headers.get("Test").is_empty());
        assert_eq!(headers.line("Test"), "");
        assert_eq!(headers.remove("Test"), None);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let headers: Headers = [("B", "1"), ("a", "2"), ("b", "3")].into_iter().collect();
        let pairs: Vec<_> = headers.iter().map(|(n, v)| (n.to_string(), v.to_vec())).collect();
        assert_eq!(
            pairs,
            vec![
                ("B".to_string(), vec!["1".to_string(), "3".to_string()]),
                ("a".to_string(), vec!["2".to_string()]),
            ]
        );
    }
}
