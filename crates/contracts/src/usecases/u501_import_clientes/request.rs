use serde::{Deserialize, Serialize};

use crate::shared::validation::field::ClientField;

/// Запрос на создание сессии импорта: лист уже разобран на клиенте
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartImportRequest {
    pub file_name: String,
    /// Первая строка - заголовки; ячейки как их отдал парсер (строки, числа, null)
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Редактирование одной ячейки
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCellRequest {
    pub field: ClientField,
    pub value: String,
}

/// Подтверждение сохранения строк, чья cédula уже есть в базе
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmDuplicatesRequest {
    pub row_indices: Vec<usize>,
    /// Обязательное обоснование, уходит на сервер для аудита
    pub comentario: String,
}
