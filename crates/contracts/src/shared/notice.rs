//! Toasts shown to the user during an import and the tracker that keeps
//! identical validation toasts from being repeated.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::validation::field::ClientField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Error,
    Warning,
    Success,
}

/// Transient notice; dismissed by the user or expired by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ToastKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<ClientField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
}

impl Toast {
    fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            message: message.into(),
            suggestion: None,
            field: None,
            row_index: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, message)
    }

    pub fn for_row(mut self, row_index: usize) -> Self {
        self.row_index = Some(row_index);
        self
    }

    pub fn for_field(mut self, field: ClientField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn with_suggestion(mut self, suggestion: Option<&str>) -> Self {
        self.suggestion = suggestion.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationEntry {
    pub violation_count: u32,
    pub last_row_data: String,
}

/// Remembers which (field, row) violations were already reported
#[derive(Debug, Clone, Default)]
pub struct ViolationTracker {
    entries: HashMap<String, ViolationEntry>,
}

impl ViolationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(field: ClientField, row_index: usize) -> String {
        format!("{}-{}", field.as_str(), row_index)
    }

    /// Records a violation and tells whether a toast should be raised.
    ///
    /// First violation or changed row data -> `true` (count restarts at 1);
    /// same data as last time -> `false` (count incremented).
    pub fn should_notify(&mut self, field: ClientField, row_index: usize, row_data: &str) -> bool {
        match self.entries.get_mut(&Self::key(field, row_index)) {
            Some(entry) if entry.last_row_data == row_data => {
                entry.violation_count += 1;
                false
            }
            Some(entry) => {
                entry.violation_count = 1;
                entry.last_row_data = row_data.to_string();
                true
            }
            None => {
                self.entries.insert(
                    Self::key(field, row_index),
                    ViolationEntry {
                        violation_count: 1,
                        last_row_data: row_data.to_string(),
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, field: ClientField, row_index: usize) -> Option<&ViolationEntry> {
        self.entries.get(&Self::key(field, row_index))
    }

    /// Field became valid again
    pub fn clear(&mut self, field: ClientField, row_index: usize) {
        self.entries.remove(&Self::key(field, row_index));
    }

    /// Row left the session
    pub fn clear_row(&mut self, row_index: usize) {
        for field in ClientField::ALL {
            self.clear(field, row_index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_suppresses_repeats() {
        let mut tracker = ViolationTracker::new();
        assert!(tracker.should_notify(ClientField::Email, 4, "a"));
        assert!(!tracker.should_notify(ClientField::Email, 4, "a"));
        assert!(!tracker.should_notify(ClientField::Email, 4, "a"));
        assert_eq!(tracker.get(ClientField::Email, 4).unwrap().violation_count, 3);

        // other row, same field
        assert!(tracker.should_notify(ClientField::Email, 5, "a"));
    }

    #[test]
    fn test_tracker_resets_on_changed_data() {
        let mut tracker = ViolationTracker::new();
        tracker.should_notify(ClientField::Telefono, 1, "x");
        tracker.should_notify(ClientField::Telefono, 1, "x");
        assert!(tracker.should_notify(ClientField::Telefono, 1, "y"));
        assert_eq!(tracker.get(ClientField::Telefono, 1).unwrap().violation_count, 1);

        tracker.clear_row(1);
        assert!(tracker.get(ClientField::Telefono, 1).is_none());
    }

    #[test]
    fn test_toast_json_shape() {
        let toast = Toast::error("Email inválido")
            .for_row(2)
            .for_field(ClientField::Email)
            .with_suggestion(Some("usuario@dominio.com"));
        let json = serde_json::to_value(&toast).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["rowIndex"], 2);
        assert_eq!(json["field"], "email");
        assert_eq!(json["suggestion"], "usuario@dominio.com");
    }
}
