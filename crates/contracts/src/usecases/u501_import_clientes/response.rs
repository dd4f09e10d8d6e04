use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::excel::ColumnMapping;
use crate::domain::a001_cliente::{ClienteCreado, ClienteCreate, ConflictoDuplicado};
use crate::shared::notice::Toast;
use crate::shared::validation::duplicates::DuplicateReason;
use crate::shared::validation::row::ExcelRow;

/// Состояние строки в сессии импорта
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Valid,
    Invalid,
    Saving,
    Saved,
    /// Последняя попытка сохранения не удалась; строка доступна для повтора
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowView {
    #[serde(flatten)]
    pub row: ExcelRow,
    pub status: RowStatus,
    pub duplicate_reasons: Vec<DuplicateReason>,
    pub duplicado_motivo: Option<String>,
    /// Пользователь подтвердил дубликат с обоснованием
    pub duplicate_confirmed: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_rows: usize,
    pub pending: usize,
    pub valid: usize,
    pub invalid: usize,
    pub saving: usize,
    pub saved: usize,
    pub failed: usize,
    pub duplicated_in_file: usize,
    pub database_duplicates: usize,
}

/// Открытое окно подтверждения дубликата
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateConflictView {
    pub row_index: usize,
    #[serde(flatten)]
    pub conflicto: ConflictoDuplicado,
    pub cliente_nuevo: ClienteCreate,
}

/// Снимок сессии импорта
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSessionView {
    pub session_id: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub column_mapping: Vec<ColumnMapping>,
    pub rows: Vec<RowView>,
    pub saved_clients: Vec<usize>,
    pub summary: ImportSummary,
    pub toasts: Vec<Toast>,
    pub pending_conflict: Option<DuplicateConflictView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadySaved,
    AlreadySaving,
    Invalid,
    UnconfirmedDuplicate,
}

/// Итог сохранения одной строки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved {
        row_index: usize,
        cliente: ClienteCreado,
    },
    /// Сервер сообщил о дубликате; открыто окно подтверждения
    Conflict {
        row_index: usize,
        conflicto: ConflictoDuplicado,
    },
    Failed {
        row_index: usize,
        message: String,
    },
    Skipped {
        row_index: usize,
        reason: SkipReason,
    },
}

impl SaveOutcome {
    pub fn row_index(&self) -> usize {
        match self {
            SaveOutcome::Saved { row_index, .. }
            | SaveOutcome::Conflict { row_index, .. }
            | SaveOutcome::Failed { row_index, .. }
            | SaveOutcome::Skipped { row_index, .. } => *row_index,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }
}

/// Итог массового сохранения; результат по каждой строке сохраняется
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkSaveReport {
    pub attempted: usize,
    pub saved: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<SaveOutcome>,
}

impl BulkSaveReport {
    pub fn push(&mut self, outcome: SaveOutcome) {
        match &outcome {
            SaveOutcome::Saved { .. } => self.saved += 1,
            SaveOutcome::Conflict { .. } => self.conflicts += 1,
            SaveOutcome::Failed { .. } => self.failed += 1,
            SaveOutcome::Skipped { .. } => self.skipped += 1,
        }
        if !matches!(outcome, SaveOutcome::Skipped { .. }) {
            self.attempted += 1;
        }
        self.outcomes.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_report_counts() {
        let mut report = BulkSaveReport::default();
        report.push(SaveOutcome::Failed {
            row_index: 1,
            message: "timeout".into(),
        });
        report.push(SaveOutcome::Skipped {
            row_index: 2,
            reason: SkipReason::UnconfirmedDuplicate,
        });
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.outcomes[1].row_index(), 2);
    }

    #[test]
    fn test_outcome_is_tagged() {
        let json = serde_json::to_value(SaveOutcome::Skipped {
            row_index: 4,
            reason: SkipReason::AlreadySaved,
        })
        .unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "already_saved");
    }
}
