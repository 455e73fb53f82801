use std::sync::Arc;

/// One source row, kept in its original column order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    fields: Vec<(String, String)>,
}

impl Payload {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Payload
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An identifier to check plus the row it came from.
///
/// Records are shared between the runner and their task through `Arc`, so the
/// payload is never copied until it lands in the found-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    key: String,
    payload: Payload,
}

pub type SharedRecord = Arc<InputRecord>;

impl InputRecord {
    pub fn new(key: impl Into<String>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}
