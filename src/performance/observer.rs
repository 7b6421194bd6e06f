//! Platform timing entries and the sources that deliver them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Navigation,
    Resource,
    #[serde(rename = "longtask")]
    LongTask,
}

impl EntryType {
    /// Entry types the monitor subscribes to on start.
    pub const OBSERVED: [EntryType; 3] = [
        EntryType::Navigation,
        EntryType::Resource,
        EntryType::LongTask,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntryType::Navigation => "navigation",
            EntryType::Resource => "resource",
            EntryType::LongTask => "longtask",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timing entry as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    pub entry_type: EntryType,
    pub name: String,
    /// Milliseconds since the page time origin
    pub start_time_ms: f64,
    pub duration_ms: f64,
    /// Type-specific fields (transfer size, DOM timings, attribution)
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl PerformanceEntry {
    pub fn new(entry_type: EntryType, name: impl Into<String>, duration_ms: f64) -> Self {
        Self {
            entry_type,
            name: name.into(),
            start_time_ms: 0.0,
            duration_ms,
            detail: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_start_time(mut self, start_time_ms: f64) -> Self {
        self.start_time_ms = start_time_ms;
        self
    }

    #[must_use]
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = detail;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("entry type '{0}' is not supported on this platform")]
    Unsupported(EntryType),
    #[error("entry source has shut down")]
    Closed,
}

/// Something that can stream timing entries of a given type.
pub trait PerformanceEntrySource: Send + Sync {
    fn observe(
        &self,
        entry_type: EntryType,
    ) -> Result<broadcast::Receiver<PerformanceEntry>, ObserverError>;
}

/// In-process source: the host pushes entries with [`ChannelEntrySource::emit`].
#[derive(Debug)]
pub struct ChannelEntrySource {
    channels: HashMap<EntryType, broadcast::Sender<PerformanceEntry>>,
}

impl ChannelEntrySource {
    /// Source supporting only `supported`; observing anything else fails.
    pub fn new(supported: &[EntryType], capacity: usize) -> Self {
        let channels = supported
            .iter()
            .map(|&entry_type| (entry_type, broadcast::channel(capacity.max(1)).0))
            .collect();
        Self { channels }
    }

    pub fn all(capacity: usize) -> Self {
        Self::new(&EntryType::OBSERVED, capacity)
    }

    pub fn supports(&self, entry_type: EntryType) -> bool {
        self.channels.contains_key(&entry_type)
    }

    /// Publish `entry`, returning how many observers received it.
    pub fn emit(&self, entry: PerformanceEntry) -> Result<usize, ObserverError> {
        let sender = self
            .channels
            .get(&entry.entry_type)
            .ok_or(ObserverError::Unsupported(entry.entry_type))?;
        Ok(sender.send(entry).unwrap_or(0))
    }
}

impl PerformanceEntrySource for ChannelEntrySource {
    fn observe(
        &self,
        entry_type: EntryType,
    ) -> Result<broadcast::Receiver<PerformanceEntry>, ObserverError> {
        self.channels
            .get(&entry_type)
            .map(broadcast::Sender::subscribe)
            .ok_or(ObserverError::Unsupported(entry_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_types_are_refused() {
        let source = ChannelEntrySource::new(&[EntryType::Navigation], 8);
        assert!(source.observe(EntryType::Navigation).is_ok());
        assert_eq!(
            source.observe(EntryType::LongTask).unwrap_err(),
            ObserverError::Unsupported(EntryType::LongTask)
        );
        assert!(source
            .emit(PerformanceEntry::new(EntryType::Resource, "/app.js", 12.0))
            .is_err());
    }

    #[test]
    fn entry_type_wire_names() {
        assert_eq!(
            serde_json::to_value(EntryType::LongTask).unwrap(),
            serde_json::json!("longtask")
        );
        assert_eq!(EntryType::Navigation.to_string(), "navigation");
    }

    #[tokio::test]
    async fn observers_receive_emitted_entries() {
        let source = ChannelEntrySource::all(8);
        let mut rx = source.observe(EntryType::Resource).unwrap();

        let entry = PerformanceEntry::new(EntryType::Resource, "/api/employees", 48.5)
            .with_detail(serde_json::json!({ "transferSize": 2048 }));
        assert_eq!(source.emit(entry.clone()).unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), entry);
    }
}
