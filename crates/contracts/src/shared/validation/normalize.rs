//! Normalizers for raw spreadsheet cells
//!
//! All functions here are total: unparseable input is echoed back and the
//! error is left to field validation.

use chrono::{DateTime, NaiveDate, TimeDelta};

use super::field::ClientField;

/// Sentinel written in a cell when the data is intentionally missing
pub const NN_SENTINEL: &str = "NN";

/// Excel serial numbers beyond this point fall after 9999-12-31
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Formats tried when no known date shape matches
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Typed spreadsheet cell as delivered by the sheet parser
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Canonical text form of the cell; whole numbers lose the trailing `.0`
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Date(d) => d.format("%d/%m/%Y").to_string(),
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

pub fn is_nn(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case(NN_SENTINEL)
}

/// Trims the value and blanks the "NN" sentinel
pub fn blank_if_nn(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case(NN_SENTINEL) {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Title-cases every word and collapses whitespace: "juan  PEREZ" -> "Juan Perez"
pub fn format_nombres(value: &str) -> String {
    if value.trim().is_empty() {
        return value.to_string();
    }

    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    let mut out: String = first.to_uppercase().collect();
                    out.push_str(&chars.as_str().to_lowercase());
                    out
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Converts an Excel serial day number (1900 date system) to a date.
///
/// Serial 1 is 1900-01-01, but Excel counts the non-existent 1900-02-29,
/// so modern serials land two days before `1900-01-01 + serial`.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let days = serial.floor() as i64;
    NaiveDate::from_ymd_opt(1900, 1, 1)?.checked_add_signed(TimeDelta::try_days(days - 2)?)
}

/// Converts any date-looking cell into `DD/MM/YYYY`.
///
/// Returns the original text when the value cannot be understood.
pub fn convertir_fecha_excel(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Date(d) => format_dmy(*d),
        CellValue::Number(n) => match excel_serial_to_date(*n) {
            Some(d) => format_dmy(d),
            None => value.as_text(),
        },
        CellValue::Bool(_) => value.as_text(),
        CellValue::Text(s) => convertir_fecha_texto(s),
    }
}

fn convertir_fecha_texto(value: &str) -> String {
    let t = value.trim();
    if t.is_empty() {
        return value.to_string();
    }

    if t.chars().all(|c| c.is_ascii_digit() || c == '.') {
        if let Ok(serial) = t.parse::<f64>() {
            return match excel_serial_to_date(serial) {
                Some(d) => format_dmy(d),
                None => value.to_string(),
            };
        }
    }

    if let Some((day, month, year)) = dmy_parts(t, '/') {
        return format!("{:02}/{:02}/{:04}", day, month, year);
    }

    if let Some((year, month, day)) = iso_parts(t) {
        return format!("{:02}/{:02}/{:04}", day, month, year);
    }

    if let Some((day, month, year)) = dmy_parts(t, '-') {
        return format!("{:02}/{:02}/{:04}", day, month, year);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return format_dmy(dt.date_naive());
    }
    for fmt in FALLBACK_DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return format_dmy(d);
        }
    }

    value.to_string()
}

/// `DD/MM/YYYY` -> `YYYY-MM-DD`; anything else is passed through
pub fn convertir_fecha_para_backend(value: &str) -> String {
    match dmy_parts(value.trim(), '/') {
        Some((day, month, year)) => format!("{:04}-{:02}-{:02}", year, month, day),
        None => value.to_string(),
    }
}

/// Parse-time normalization of one cell.
///
/// The "NN" sentinel is kept (upper-cased) so that validation can tell an
/// intentional omission from a missing value; it is blanked when the
/// create payload is built.
pub fn normalize_cell(field: ClientField, cell: &CellValue) -> String {
    let text = cell.as_text();
    if is_nn(&text) {
        return NN_SENTINEL.to_string();
    }

    match field {
        ClientField::FechaNacimiento => convertir_fecha_excel(cell).trim().to_string(),
        ClientField::Nombres => format_nombres(text.trim()),
        ClientField::Estado => text.trim().to_uppercase(),
        ClientField::Activo => text.trim().to_lowercase(),
        _ => text.trim().to_string(),
    }
}

fn format_dmy(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

fn is_digits(s: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Splits `D{1,2}<sep>M{1,2}<sep>YYYY` into numbers without range checks
pub(crate) fn dmy_parts(value: &str, sep: char) -> Option<(u32, u32, i32)> {
    let parts: Vec<&str> = value.split(sep).collect();
    if parts.len() != 3
        || !is_digits(parts[0], 1, 2)
        || !is_digits(parts[1], 1, 2)
        || !is_digits(parts[2], 4, 4)
    {
        return None;
    }
    Some((parts[0].parse().ok()?, parts[1].parse().ok()?, parts[2].parse().ok()?))
}

/// `YYYY-MM-DD`, optionally followed by a time part
fn iso_parts(value: &str) -> Option<(i32, u32, u32)> {
    let date_part = match value.find(['T', ' ']) {
        Some(pos) => &value[..pos],
        None => value,
    };
    let parts: Vec<&str> = date_part.split('-').collect();
    if parts.len() != 3
        || !is_digits(parts[0], 4, 4)
        || !is_digits(parts[1], 2, 2)
        || !is_digits(parts[2], 2, 2)
    {
        return None;
    }
    Some((parts[0].parse().ok()?, parts[1].parse().ok()?, parts[2].parse().ok()?))
}
