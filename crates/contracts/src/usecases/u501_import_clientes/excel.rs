use serde::{Deserialize, Serialize};

use crate::shared::validation::field::ClientField;
use crate::shared::validation::normalize::{normalize_cell, CellValue};
use crate::shared::validation::row::ExcelRow;

/// Определение колонки для импорта
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub field: ClientField,
    /// Заголовок для отображения
    pub title: &'static str,
    /// Другие допустимые заголовки
    pub aliases: &'static [&'static str],
}

pub const COLUMNS: [ColumnDef; 10] = [
    ColumnDef {
        field: ClientField::Cedula,
        title: "Cédula",
        aliases: &["ci", "documento", "cedula de identidad"],
    },
    ColumnDef {
        field: ClientField::Nombres,
        title: "Nombres",
        aliases: &["nombre", "nombre completo", "nombres y apellidos"],
    },
    ColumnDef {
        field: ClientField::Telefono,
        title: "Teléfono",
        aliases: &["celular", "movil", "telefono celular"],
    },
    ColumnDef {
        field: ClientField::Email,
        title: "Email",
        aliases: &["correo", "correo electronico", "e-mail"],
    },
    ColumnDef {
        field: ClientField::Direccion,
        title: "Dirección",
        aliases: &["domicilio"],
    },
    ColumnDef {
        field: ClientField::FechaNacimiento,
        title: "Fecha de nacimiento",
        aliases: &["fecha nacimiento", "nacimiento", "fecha_nacimiento"],
    },
    ColumnDef {
        field: ClientField::Ocupacion,
        title: "Ocupación",
        aliases: &["profesion", "oficio"],
    },
    ColumnDef {
        field: ClientField::Estado,
        title: "Estado",
        aliases: &["estatus"],
    },
    ColumnDef {
        field: ClientField::Activo,
        title: "Activo",
        aliases: &["es activo"],
    },
    ColumnDef {
        field: ClientField::Notas,
        title: "Notas",
        aliases: &["observaciones", "comentarios"],
    },
];

/// Статус сопоставления колонки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub field: ClientField,
    /// Ожидаемое имя колонки
    pub expected: String,
    /// Найденное имя колонки в файле
    pub found: Option<String>,
    /// Индекс в файле
    pub file_index: Option<usize>,
}

/// Лист как пришёл из парсера: первая строка - заголовки
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub file_name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// Результат разбора листа
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub file_name: String,
    pub file_headers: Vec<String>,
    pub column_mapping: Vec<ColumnMapping>,
    /// Нормализованные, но ещё не проверенные строки
    pub rows: Vec<ExcelRow>,
}

impl ParsedSheet {
    /// Ожидаемые колонки, которых нет в файле
    pub fn missing_columns(&self) -> Vec<&str> {
        self.column_mapping
            .iter()
            .filter(|m| m.found.is_none())
            .map(|m| m.expected.as_str())
            .collect()
    }

    /// Заголовки файла, которые не попали ни в одно поле
    pub fn ignored_headers(&self) -> Vec<&str> {
        self.file_headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                !h.is_empty() && !self.column_mapping.iter().any(|m| m.file_index == Some(*i))
            })
            .map(|(_, h)| h.as_str())
            .collect()
    }
}

/// Lowercase, accents folded, separators collapsed to '_'
fn header_key(header: &str) -> String {
    let folded: String = header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            c if c.is_alphanumeric() => c,
            _ => '_',
        })
        .collect();
    folded
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

impl RawSheet {
    pub fn from_json(file_name: impl Into<String>, rows: &[Vec<serde_json::Value>]) -> Self {
        Self {
            file_name: file_name.into(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(CellValue::from_json).collect())
                .collect(),
        }
    }

    pub fn from_text(file_name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            file_name: file_name.into(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(CellValue::Text).collect())
                .collect(),
        }
    }

    /// Сопоставление заголовков файла с колонками импорта.
    ///
    /// Сначала точные совпадения (название, имя поля, синонимы), затем
    /// поиск по вхождению для оставшихся. Одна колонка файла используется
    /// не более одного раза; отсутствующие колонки не прерывают импорт.
    pub fn map_columns(&self) -> Result<Vec<ColumnMapping>, String> {
        let headers = self.rows.first().ok_or_else(|| "El archivo está vacío".to_string())?;
        let keys: Vec<String> = headers.iter().map(|h| header_key(&h.as_text())).collect();

        let mut used = vec![false; keys.len()];
        let mut found: Vec<Option<usize>> = vec![None; COLUMNS.len()];

        for (col_pos, col) in COLUMNS.iter().enumerate() {
            let candidates: Vec<String> = std::iter::once(col.title)
                .chain(std::iter::once(col.field.as_str()))
                .chain(col.aliases.iter().copied())
                .map(header_key)
                .collect();
            if let Some(idx) = keys
                .iter()
                .enumerate()
                .position(|(i, k)| !used[i] && candidates.contains(k))
            {
                used[idx] = true;
                found[col_pos] = Some(idx);
            }
        }

        for (col_pos, col) in COLUMNS.iter().enumerate() {
            if found[col_pos].is_some() {
                continue;
            }
            let title = header_key(col.field.as_str());
            if let Some(idx) = keys.iter().enumerate().position(|(i, k)| {
                !used[i] && k.len() >= 4 && (k.contains(&title) || title.contains(k.as_str()))
            }) {
                used[idx] = true;
                found[col_pos] = Some(idx);
            }
        }

        Ok(COLUMNS
            .iter()
            .zip(found)
            .map(|(col, idx)| ColumnMapping {
                field: col.field,
                expected: col.title.to_string(),
                found: idx.map(|i| headers[i].as_text().trim().to_string()),
                file_index: idx,
            })
            .collect())
    }

    /// Разбирает строки данных: пустые строки пропускаются, `_rowIndex`
    /// равен позиции строки данных в файле (с 1), значения нормализуются.
    pub fn into_rows(self) -> Result<ParsedSheet, String> {
        let column_mapping = self.map_columns()?;
        let file_headers: Vec<String> = self.rows[0]
            .iter()
            .map(|h| h.as_text().trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (pos, raw) in self.rows.iter().skip(1).enumerate() {
            let mut row = ExcelRow::new(pos + 1);
            let mut any_value = false;

            for mapping in &column_mapping {
                let Some(cell) = mapping.file_index.and_then(|i| raw.get(i)) else {
                    continue;
                };
                let value = normalize_cell(mapping.field, cell);
                any_value |= !value.is_empty();
                row.set_raw(mapping.field, value);
            }

            if any_value {
                rows.push(row);
            }
        }

        Ok(ParsedSheet {
            file_name: self.file_name,
            file_headers,
            column_mapping,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_key() {
        assert_eq!(header_key("  Fecha de Nacimiento "), "fecha_de_nacimiento");
        assert_eq!(header_key("Cédula"), "cedula");
        assert_eq!(header_key("fecha_nacimiento"), "fecha_nacimiento");
    }

    #[test]
    fn test_map_columns_with_aliases_and_missing() {
        let sheet = RawSheet::from_text(
            "clientes.xlsx",
            vec![vec![
                "CI".into(),
                "Nombre completo".into(),
                "Correo".into(),
                "Celular".into(),
                "Fecha de Nacimiento".into(),
            ]],
        );
        let mapping = sheet.map_columns().unwrap();
        let by_field = |f: ClientField| mapping.iter().find(|m| m.field == f).unwrap().clone();

        assert_eq!(by_field(ClientField::Cedula).file_index, Some(0));
        assert_eq!(by_field(ClientField::Nombres).file_index, Some(1));
        assert_eq!(by_field(ClientField::Email).file_index, Some(2));
        assert_eq!(by_field(ClientField::Telefono).file_index, Some(3));
        assert_eq!(by_field(ClientField::FechaNacimiento).file_index, Some(4));
        assert_eq!(by_field(ClientField::Direccion).found, None);
    }

    #[test]
    fn test_substring_fallback_does_not_reuse_columns() {
        let sheet = RawSheet::from_text(
            "c.csv",
            vec![vec!["Estado del cliente".into(), "Notas internas".into()]],
        );
        let mapping = sheet.map_columns().unwrap();
        let estado = mapping.iter().find(|m| m.field == ClientField::Estado).unwrap();
        let notas = mapping.iter().find(|m| m.field == ClientField::Notas).unwrap();
        assert_eq!(estado.file_index, Some(0));
        assert_eq!(notas.file_index, Some(1));
    }

    #[test]
    fn test_into_rows_normalizes_and_skips_empty() {
        let raw = vec![
            vec![json!("Cédula"), json!("Nombres"), json!("Teléfono"), json!("Fecha de nacimiento"), json!("Estado")],
            vec![json!("V12345678"), json!("juan PEREZ"), json!(4121234567u64), json!(32874), json!("activo")],
            vec![json!(null), json!(""), json!(null), json!(null), json!(null)],
            vec![json!("nn"), json!("ana diaz"), json!("04121234567"), json!("1990-05-01"), json!("LEGACY")],
        ];
        let parsed = RawSheet::from_json("clientes.xlsx", &raw).into_rows().unwrap();

        assert_eq!(parsed.rows.len(), 2);
        let first = &parsed.rows[0];
        assert_eq!(first.row_index, 1);
        assert_eq!(first.nombres, "Juan Perez");
        assert_eq!(first.telefono, "4121234567");
        assert_eq!(first.fecha_nacimiento, "01/01/1990");
        assert_eq!(first.estado, "ACTIVO");

        let second = &parsed.rows[1];
        assert_eq!(second.row_index, 3);
        assert_eq!(second.cedula, "NN");
        assert_eq!(second.fecha_nacimiento, "01/05/1990");
        assert_eq!(parsed.missing_columns().len(), 5);
        assert!(parsed.ignored_headers().is_empty());
    }

    #[test]
    fn test_ignored_headers_are_reported() {
        let sheet = RawSheet::from_text(
            "c.csv",
            vec![
                vec!["Cédula".into(), "Código vendedor".into(), "".into(), "Nombres".into()],
                vec!["V12345678".into(), "A-17".into(), "".into(), "Ana Diaz".into()],
            ],
        );
        let parsed = sheet.into_rows().unwrap();
        assert_eq!(parsed.ignored_headers(), vec!["Código vendedor"]);
        assert!(parsed.missing_columns().contains(&"Teléfono"));
        assert!(!parsed.missing_columns().contains(&"Cédula"));
    }

    #[test]
    fn test_empty_sheet_is_an_error() {
        let sheet = RawSheet::from_text("vacio.csv", vec![]);
        assert!(sheet.into_rows().is_err());
    }
}
