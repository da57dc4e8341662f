//! LogItem - a single log record inside a batch

use serde::{Deserialize, Serialize};

/// Key/value field of a log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContent {
    pub key: String,
    pub value: String,
}

/// One log record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogItem {
    /// Unix timestamp in seconds
    pub time: u32,
    /// Ordered fields
    pub contents: Vec<LogContent>,
}

impl LogItem {
    /// Create an empty record with the given timestamp
    pub fn new(time: u32) -> Self {
        Self {
            time,
            contents: Vec::new(),
        }
    }

    /// Append a field, builder style
    pub fn with_content(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_content(key, value);
        self
    }

    /// Append a field
    pub fn push_content(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.contents.push(LogContent {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Approximate serialized size, used by producers to compute batch weight
    pub fn approximate_size(&self) -> usize {
        4 + self
            .contents
            .iter()
            .map(|c| c.key.len() + c.value.len())
            .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let item = LogItem::new(10)
            .with_content("level", "info")
            .with_content("msg", "hello");
        assert_eq!(item.contents.len(), 2);
        assert_eq!(item.contents[0].key, "level");
        assert_eq!(item.contents[1].value, "hello");
        assert_eq!(item.approximate_size(), 4 + 5 + 4 + 3 + 5);
    }
}
