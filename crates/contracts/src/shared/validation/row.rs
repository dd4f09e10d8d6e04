//! One spreadsheet row under edit and its aggregated validation state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::field::ClientField;
use super::rules::{validate_field, ValidationOptions, ValidationResult};

/// Row of the client import sheet.
///
/// `_validation` and `_hasErrors` are only written by [`ExcelRow::validate_all`]
/// and [`ExcelRow::update_field`], so `_hasErrors` always equals "some
/// validation result is invalid".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcelRow {
    #[serde(default)]
    pub cedula: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub fecha_nacimiento: String,
    #[serde(default)]
    pub ocupacion: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub activo: String,
    #[serde(default)]
    pub notas: String,

    #[serde(rename = "_rowIndex")]
    pub row_index: usize,
    #[serde(rename = "_validation", skip_deserializing)]
    validation: BTreeMap<ClientField, ValidationResult>,
    #[serde(rename = "_hasErrors", skip_deserializing)]
    has_errors: bool,
}

impl ExcelRow {
    pub fn new(row_index: usize) -> Self {
        Self {
            cedula: String::new(),
            nombres: String::new(),
            telefono: String::new(),
            email: String::new(),
            direccion: String::new(),
            fecha_nacimiento: String::new(),
            ocupacion: String::new(),
            estado: String::new(),
            activo: String::new(),
            notas: String::new(),
            row_index,
            validation: BTreeMap::new(),
            has_errors: false,
        }
    }

    pub fn get(&self, field: ClientField) -> &str {
        match field {
            ClientField::Cedula => &self.cedula,
            ClientField::Nombres => &self.nombres,
            ClientField::Telefono => &self.telefono,
            ClientField::Email => &self.email,
            ClientField::Direccion => &self.direccion,
            ClientField::FechaNacimiento => &self.fecha_nacimiento,
            ClientField::Ocupacion => &self.ocupacion,
            ClientField::Estado => &self.estado,
            ClientField::Activo => &self.activo,
            ClientField::Notas => &self.notas,
        }
    }

    fn slot_mut(&mut self, field: ClientField) -> &mut String {
        match field {
            ClientField::Cedula => &mut self.cedula,
            ClientField::Nombres => &mut self.nombres,
            ClientField::Telefono => &mut self.telefono,
            ClientField::Email => &mut self.email,
            ClientField::Direccion => &mut self.direccion,
            ClientField::FechaNacimiento => &mut self.fecha_nacimiento,
            ClientField::Ocupacion => &mut self.ocupacion,
            ClientField::Estado => &mut self.estado,
            ClientField::Activo => &mut self.activo,
            ClientField::Notas => &mut self.notas,
        }
    }

    /// Sets a raw value without validating (used while building a row)
    pub fn set_raw(&mut self, field: ClientField, value: impl Into<String>) {
        *self.slot_mut(field) = value.into();
    }

    /// Runs every field validator
    pub fn validate_all(&mut self, options: &ValidationOptions) {
        self.validation = ClientField::ALL
            .into_iter()
            .map(|field| (field, validate_field(field, self.get(field), options)))
            .collect();
        self.recompute_has_errors();
    }

    /// Cell edit: stores the value and revalidates only that field
    pub fn update_field(
        &mut self,
        field: ClientField,
        value: impl Into<String>,
        options: &ValidationOptions,
    ) -> &ValidationResult {
        *self.slot_mut(field) = value.into();
        let result = validate_field(field, self.get(field), options);
        self.validation.insert(field, result);
        self.recompute_has_errors();
        &self.validation[&field]
    }

    fn recompute_has_errors(&mut self) {
        self.has_errors = self.validation.values().any(|r| !r.is_valid);
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn validation(&self, field: ClientField) -> Option<&ValidationResult> {
        self.validation.get(&field)
    }

    pub fn validations(&self) -> &BTreeMap<ClientField, ValidationResult> {
        &self.validation
    }

    /// Invalid fields with their messages
    pub fn errors(&self) -> Vec<(ClientField, &str)> {
        self.validation
            .iter()
            .filter(|(_, r)| !r.is_valid)
            .map(|(f, r)| (*f, r.message.as_deref().unwrap_or_default()))
            .collect()
    }

    /// Normalized value when validation produced one, otherwise the trimmed raw value
    pub fn normalized(&self, field: ClientField) -> String {
        self.validation
            .get(&field)
            .and_then(|r| r.normalized_value.clone())
            .unwrap_or_else(|| self.get(field).trim().to_string())
    }

    /// Fingerprint of the raw values, used to detect edits between validation passes
    pub fn data_fingerprint(&self) -> String {
        ClientField::ALL
            .iter()
            .map(|f| self.get(*f))
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn opts() -> ValidationOptions {
        ValidationOptions::default().with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    fn valid_row(row_index: usize) -> ExcelRow {
        let mut row = ExcelRow::new(row_index);
        row.set_raw(ClientField::Cedula, "V12345678");
        row.set_raw(ClientField::Nombres, "Juan Perez");
        row.set_raw(ClientField::Telefono, "4121234567");
        row.set_raw(ClientField::Email, "juan@correo.com");
        row.set_raw(ClientField::Direccion, "Av. Bolivar, Caracas");
        row.set_raw(ClientField::FechaNacimiento, "01/01/1990");
        row.set_raw(ClientField::Ocupacion, "Comerciante");
        row.set_raw(ClientField::Estado, "ACTIVO");
        row.set_raw(ClientField::Activo, "true");
        row
    }

    fn invariant_holds(row: &ExcelRow) -> bool {
        row.has_errors() == row.validations().values().any(|r| !r.is_valid)
    }

    #[test]
    fn test_validate_all_valid_row() {
        let mut row = valid_row(1);
        row.validate_all(&opts());
        assert!(!row.has_errors());
        assert_eq!(row.validations().len(), ClientField::ALL.len());
        assert!(invariant_holds(&row));
    }

    #[test]
    fn test_update_field_tracks_errors() {
        let mut row = valid_row(1);
        row.validate_all(&opts());

        let result = row.update_field(ClientField::Email, "sin-arroba", &opts());
        assert!(!result.is_valid);
        assert!(row.has_errors());
        assert!(invariant_holds(&row));
        assert_eq!(row.errors().len(), 1);
        assert_eq!(row.errors()[0].0, ClientField::Email);

        row.update_field(ClientField::Email, "ok@correo.com", &opts());
        assert!(!row.has_errors());
        assert!(invariant_holds(&row));
    }

    #[test]
    fn test_empty_row_has_errors() {
        let mut row = ExcelRow::new(3);
        row.validate_all(&opts());
        assert!(row.has_errors());
        assert!(invariant_holds(&row));
        // cedula and notas are optional
        assert!(row.validation(ClientField::Cedula).unwrap().is_valid);
        assert!(row.validation(ClientField::Notas).unwrap().is_valid);
    }

    #[test]
    fn test_normalized_prefers_validator_output() {
        let mut row = valid_row(1);
        row.set_raw(ClientField::Telefono, "+58 412 123 4567");
        row.set_raw(ClientField::Notas, "  cliente nuevo ");
        row.validate_all(&opts());
        assert_eq!(row.normalized(ClientField::Telefono), "4121234567");
        assert_eq!(row.normalized(ClientField::Notas), "cliente nuevo");
    }

    #[test]
    fn test_serde_shape() {
        let mut row = valid_row(7);
        row.validate_all(&opts());
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["_rowIndex"], 7);
        assert_eq!(json["_hasErrors"], false);
        assert_eq!(json["_validation"]["cedula"]["isValid"], true);
    }
}
