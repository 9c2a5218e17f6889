use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// GENERATION HISTORY
// ============================================================================

/// One successful generation: the prompt and the image it produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    /// Stable reference of the generated image.
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(prompt: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output: output.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only list of generations for one design session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_order() {
        let mut log = HistoryLog::new();
        log.push(HistoryEntry::new("modern living room", "https://img/1.png"));
        log.push(HistoryEntry::new("add a lamp", "https://img/2.png"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().map(|e| e.prompt.as_str()), Some("add a lamp"));
        assert_eq!(log.entries()[0].prompt, "modern living room");
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }
}
