use crate::error::{BinningError, BinningResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single event: named variable values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event {
    values: HashMap<String, f64>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, variable: impl Into<String>, value: f64) -> Self {
        self.values.insert(variable.into(), value);
        self
    }

    pub fn insert(&mut self, variable: impl Into<String>, value: f64) {
        self.values.insert(variable.into(), value);
    }

    /// Value of `variable`, or `MissingVariable` if the event does not carry it.
    pub fn value(&self, variable: &str) -> BinningResult<f64> {
        self.values
            .get(variable)
            .copied()
            .ok_or_else(|| BinningError::MissingVariable {
                variable: variable.to_string(),
            })
    }

    pub fn get(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied()
    }

    /// Returns a copy with variables renamed according to `rename` (old -> new).
    pub fn renamed(&self, rename: &HashMap<String, String>) -> Event {
        if rename.is_empty() {
            return self.clone();
        }
        let values = self
            .values
            .iter()
            .map(|(k, v)| (rename.get(k).cloned().unwrap_or_else(|| k.clone()), *v))
            .collect();
        Event { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Event {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Event {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<S: Into<String>, const N: usize> From<[(S, f64); N]> for Event {
    fn from(pairs: [(S, f64); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable() {
        let event = Event::from([("x", 0.5)]);
        assert_eq!(event.value("x").unwrap(), 0.5);
        assert!(matches!(
            event.value("y"),
            Err(BinningError::MissingVariable { .. })
        ));
    }

    #[test]
    fn test_renamed() {
        let event = Event::from([("x", 1.0), ("z", 10.0)]);
        let mut rename = HashMap::new();
        rename.insert("z".to_string(), "y".to_string());
        let renamed = event.renamed(&rename);
        assert_eq!(renamed.get("y"), Some(10.0));
        assert_eq!(renamed.get("x"), Some(1.0));
        assert_eq!(renamed.get("z"), None);
    }
}
