//! Duplicate detection within the import file and against existing clients

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::normalize::blank_if_nn;
use super::row::ExcelRow;
use super::rules::TELEFONO_COUNTRY_CODE;

/// Why a row is considered a duplicate. Axes are independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    Cedula,
    Nombres,
    Email,
    Telefono,
    ExistingInDatabase,
}

impl DuplicateReason {
    pub fn message(&self) -> &'static str {
        match self {
            DuplicateReason::Cedula => "Cédula duplicada en el archivo",
            DuplicateReason::Nombres => "Nombre duplicado en el archivo",
            DuplicateReason::Email => "Email duplicado en el archivo",
            DuplicateReason::Telefono => "Teléfono duplicado en el archivo",
            DuplicateReason::ExistingInDatabase => "La cédula ya existe en la base de datos",
        }
    }
}

pub fn normalized_cedula(value: &str) -> String {
    blank_if_nn(value)
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

pub fn normalized_nombres(value: &str) -> String {
    blank_if_nn(value)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn normalized_email(value: &str) -> String {
    blank_if_nn(value).to_lowercase()
}

pub fn normalized_telefono(value: &str) -> String {
    let digits: String = blank_if_nn(value).chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix(TELEFONO_COUNTRY_CODE) {
        Some(rest) if digits.len() > 10 => rest.to_string(),
        _ => digits,
    }
}

/// Per-row duplicate reasons for one import session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateIndex {
    reasons: BTreeMap<usize, Vec<DuplicateReason>>,
}

impl DuplicateIndex {
    pub fn reasons(&self, row_index: usize) -> &[DuplicateReason] {
        self.reasons.get(&row_index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_duplicated(&self, row_index: usize, reason: DuplicateReason) -> bool {
        self.reasons(row_index).contains(&reason)
    }

    pub fn is_database_duplicate(&self, row_index: usize) -> bool {
        self.is_duplicated(row_index, DuplicateReason::ExistingInDatabase)
    }

    /// Rows whose cedula already exists in the database, in row order
    pub fn database_duplicates(&self) -> Vec<usize> {
        self.reasons
            .iter()
            .filter(|(_, r)| r.contains(&DuplicateReason::ExistingInDatabase))
            .map(|(idx, _)| *idx)
            .collect()
    }

    /// Human readable explanation, `None` for a clean row
    pub fn duplicado_motivo(&self, row_index: usize) -> Option<String> {
        let reasons = self.reasons(row_index);
        if reasons.is_empty() {
            return None;
        }
        Some(
            reasons
                .iter()
                .map(DuplicateReason::message)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    fn flag(&mut self, row_index: usize, reason: DuplicateReason) {
        let entry = self.reasons.entry(row_index).or_default();
        if !entry.contains(&reason) {
            entry.push(reason);
            entry.sort();
        }
    }
}

/// Flags intra-file duplicates by cedula, name, email and phone, plus rows
/// whose cedula is in `existing_cedulas` (compared after normalization).
pub fn detect_duplicates(rows: &[ExcelRow], existing_cedulas: &HashSet<String>) -> DuplicateIndex {
    let mut index = DuplicateIndex::default();

    let axes: [(DuplicateReason, fn(&ExcelRow) -> String); 4] = [
        (DuplicateReason::Cedula, |r| normalized_cedula(&r.cedula)),
        (DuplicateReason::Nombres, |r| normalized_nombres(&r.nombres)),
        (DuplicateReason::Email, |r| normalized_email(&r.email)),
        (DuplicateReason::Telefono, |r| normalized_telefono(&r.telefono)),
    ];

    for (reason, key_of) in axes {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for row in rows {
            let key = key_of(row);
            if !key.is_empty() {
                groups.entry(key).or_default().push(row.row_index);
            }
        }
        for members in groups.values().filter(|m| m.len() > 1) {
            for row_index in members {
                index.flag(*row_index, reason);
            }
        }
    }

    let existing: HashSet<String> = existing_cedulas.iter().map(|c| normalized_cedula(c)).collect();
    for row in rows {
        let cedula = normalized_cedula(&row.cedula);
        if !cedula.is_empty() && existing.contains(&cedula) {
            index.flag(row.row_index, DuplicateReason::ExistingInDatabase);
        }
    }

    index
}
