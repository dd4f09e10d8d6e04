//! Field validation rules for the client import
//!
//! The thresholds here are business rules: 6-11 digit cedula, 2-7 word
//! name, 10 digit phone, 5 character address, 18 year minimum age and
//! 2 character occupation.

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::field::ClientField;
use super::normalize::{dmy_parts, format_nombres, is_nn};

pub const CEDULA_PREFIXES: [char; 4] = ['V', 'E', 'J', 'Z'];
pub const CEDULA_MIN_DIGITS: usize = 6;
pub const CEDULA_MAX_DIGITS: usize = 11;
pub const NOMBRES_MIN_WORDS: usize = 2;
pub const NOMBRES_MAX_WORDS: usize = 7;
pub const TELEFONO_DIGITS: usize = 10;
pub const TELEFONO_COUNTRY_CODE: &str = "58";
pub const DIRECCION_MIN_CHARS: usize = 5;
pub const OCUPACION_MIN_CHARS: usize = 2;
pub const EDAD_MINIMA: u32 = 18;
pub const MIN_BIRTH_YEAR: i32 = 1900;

/// Allowed values of `estado` when the caller does not supply a list
pub const DEFAULT_ESTADOS: [&str; 4] = ["ACTIVO", "INACTIVO", "FINALIZADO", "LEGACY"];

/// Outcome of validating one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
            normalized_value: None,
        }
    }

    pub fn valid_with(normalized: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: None,
            normalized_value: Some(normalized.into()),
        }
    }

    /// Accepted value that still deserves a notice
    pub fn warning(message: impl Into<String>, normalized: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            message: Some(message.into()),
            normalized_value: Some(normalized.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            normalized_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOptions {
    /// Allowed `estado` values; `None` means [`DEFAULT_ESTADOS`]
    pub estados: Option<Vec<String>>,
    /// Reference date for the birth date checks
    pub today: NaiveDate,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            estados: None,
            today: Local::now().date_naive(),
        }
    }
}

impl ValidationOptions {
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_estados(mut self, estados: Vec<String>) -> Self {
        self.estados = Some(estados);
        self
    }

    fn allows_estado(&self, estado: &str) -> bool {
        match &self.estados {
            Some(list) => list.iter().any(|e| e.trim().eq_ignore_ascii_case(estado)),
            None => DEFAULT_ESTADOS.iter().any(|e| e.eq_ignore_ascii_case(estado)),
        }
    }

    fn estados_label(&self) -> String {
        match &self.estados {
            Some(list) => list.join(", "),
            None => DEFAULT_ESTADOS.join(", "),
        }
    }
}

/// Validates one field value. An "NN" value is always accepted.
pub fn validate_field(field: ClientField, value: &str, options: &ValidationOptions) -> ValidationResult {
    if is_nn(value) {
        return ValidationResult::valid();
    }

    match field {
        ClientField::Cedula => validate_cedula(value),
        ClientField::Nombres => validate_nombres(value),
        ClientField::Telefono => validate_telefono(value),
        ClientField::Email => validate_email(value),
        ClientField::Direccion => validate_min_chars(value, DIRECCION_MIN_CHARS, "La dirección"),
        ClientField::Estado => validate_estado(value, options),
        ClientField::Activo => validate_activo(value),
        ClientField::FechaNacimiento => validate_fecha_nacimiento(value, options.today),
        ClientField::Ocupacion => validate_min_chars(value, OCUPACION_MIN_CHARS, "La ocupación"),
        ClientField::Notas => ValidationResult::valid(),
    }
}

/// Same as [`validate_field`] but keyed by column name; unknown columns are valid
pub fn validate_named(field: &str, value: &str, options: &ValidationOptions) -> ValidationResult {
    match field.parse::<ClientField>() {
        Ok(f) => validate_field(f, value, options),
        Err(_) => ValidationResult::valid(),
    }
}

/// Hint shown next to an error toast
pub fn suggestion_for(field: ClientField) -> Option<&'static str> {
    match field {
        ClientField::Cedula => Some("Use una letra V, E, J o Z seguida de 6 a 11 dígitos, por ejemplo V12345678"),
        ClientField::Nombres => Some("Escriba nombres y apellidos separados por espacios"),
        ClientField::Telefono => Some("Use 10 dígitos sin el 0 inicial, por ejemplo 4121234567"),
        ClientField::Email => Some("Use el formato usuario@dominio.com"),
        ClientField::Direccion => Some("Indique una dirección de al menos 5 caracteres"),
        ClientField::FechaNacimiento => Some("Use el formato DD/MM/AAAA"),
        ClientField::Ocupacion => Some("Indique la ocupación del cliente"),
        ClientField::Estado => Some("Use ACTIVO, INACTIVO, FINALIZADO o LEGACY"),
        ClientField::Activo => Some("Use true o false"),
        ClientField::Notas => None,
    }
}

fn validate_cedula(value: &str) -> ValidationResult {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .collect::<String>()
        .to_uppercase();
    if cleaned.is_empty() {
        return ValidationResult::valid();
    }

    let mut chars = cleaned.chars();
    let prefix_ok = chars.next().is_some_and(|c| CEDULA_PREFIXES.contains(&c));
    let digits = chars.as_str();
    let digits_ok = (CEDULA_MIN_DIGITS..=CEDULA_MAX_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit());

    if prefix_ok && digits_ok {
        ValidationResult::valid_with(cleaned)
    } else {
        ValidationResult::invalid(format!(
            "Cédula inválida: debe empezar con V, E, J o Z seguida de {} a {} dígitos",
            CEDULA_MIN_DIGITS, CEDULA_MAX_DIGITS
        ))
    }
}

fn validate_nombres(value: &str) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ValidationResult::invalid("Los nombres son requeridos");
    }

    let words = trimmed.split_whitespace().count();
    if !(NOMBRES_MIN_WORDS..=NOMBRES_MAX_WORDS).contains(&words) {
        return ValidationResult::invalid(format!(
            "Los nombres deben tener entre {} y {} palabras (tiene {})",
            NOMBRES_MIN_WORDS, NOMBRES_MAX_WORDS, words
        ));
    }

    ValidationResult::valid_with(format_nombres(trimmed))
}

fn validate_telefono(value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return ValidationResult::invalid("El teléfono es requerido");
    }

    let mut digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return ValidationResult::invalid("El teléfono debe contener dígitos");
    }
    if digits.starts_with(TELEFONO_COUNTRY_CODE) && digits.len() >= TELEFONO_DIGITS + 1 {
        digits.drain(..TELEFONO_COUNTRY_CODE.len());
    }

    if digits.starts_with('0') {
        return ValidationResult::invalid("El teléfono no debe empezar con 0");
    }
    if digits.len() > TELEFONO_DIGITS {
        return ValidationResult::warning(
            format!(
                "El teléfono tiene {} dígitos; se ajustará al registrarlo",
                digits.len()
            ),
            digits,
        );
    }
    if digits.len() != TELEFONO_DIGITS {
        return ValidationResult::invalid(format!(
            "El teléfono debe tener {} dígitos (tiene {})",
            TELEFONO_DIGITS,
            digits.len()
        ));
    }

    ValidationResult::valid_with(digits)
}

fn validate_email(value: &str) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ValidationResult::invalid("El email es requerido");
    }
    if trimmed.contains(char::is_whitespace) {
        return ValidationResult::invalid("El email no debe contener espacios");
    }
    if trimmed.contains(',') {
        return ValidationResult::invalid("El email no debe contener comas");
    }
    if !trimmed.contains('@') {
        return ValidationResult::invalid("El email debe contener @");
    }
    if !is_email_shape(trimmed) {
        return ValidationResult::invalid("El formato del email no es válido");
    }

    ValidationResult::valid_with(trimmed.to_lowercase())
}

/// local@domain.tld with an alphabetic TLD of at least two letters
fn is_email_shape(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let labels_ok = labels.iter().all(|l| {
        !l.is_empty()
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    let tld = labels[labels.len() - 1];
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    local_ok && labels_ok && tld_ok
}

fn validate_min_chars(value: &str, min: usize, subject: &str) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ValidationResult::invalid(format!("{} es requerida", subject));
    }
    if trimmed.chars().count() < min {
        return ValidationResult::invalid(format!(
            "{} debe tener al menos {} caracteres",
            subject, min
        ));
    }
    ValidationResult::valid_with(trimmed)
}

fn validate_estado(value: &str, options: &ValidationOptions) -> ValidationResult {
    let estado = value.trim().to_uppercase();
    if estado.is_empty() {
        return ValidationResult::invalid("El estado es requerido");
    }
    if !options.allows_estado(&estado) {
        return ValidationResult::invalid(format!(
            "Estado inválido. Valores permitidos: {}",
            options.estados_label()
        ));
    }
    ValidationResult::valid_with(estado)
}

fn validate_activo(value: &str) -> ValidationResult {
    let activo = value.trim().to_lowercase();
    if activo.is_empty() {
        return ValidationResult::invalid("El campo activo es requerido");
    }
    if activo != "true" && activo != "false" {
        return ValidationResult::invalid("El campo activo debe ser true o false");
    }
    ValidationResult::valid_with(activo)
}

fn validate_fecha_nacimiento(value: &str, today: NaiveDate) -> ValidationResult {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ValidationResult::invalid("La fecha de nacimiento es requerida");
    }

    let Some((day, month, year)) = dmy_parts(trimmed, '/') else {
        return ValidationResult::invalid("La fecha debe tener el formato DD/MM/AAAA");
    };
    if !(1..=31).contains(&day) {
        return ValidationResult::invalid("El día debe estar entre 1 y 31");
    }
    if !(1..=12).contains(&month) {
        return ValidationResult::invalid("El mes debe estar entre 1 y 12");
    }
    if !(MIN_BIRTH_YEAR..=today.year()).contains(&year) {
        return ValidationResult::invalid(format!(
            "El año debe estar entre {} y {}",
            MIN_BIRTH_YEAR,
            today.year()
        ));
    }

    let Some(birth) = NaiveDate::from_ymd_opt(year, month, day) else {
        return ValidationResult::invalid(format!(
            "La fecha {:02}/{:02}/{} no existe",
            day, month, year
        ));
    };
    if birth >= today {
        return ValidationResult::invalid("La fecha de nacimiento debe ser anterior a hoy");
    }

    if age_on(birth, today) < EDAD_MINIMA as i32 {
        return ValidationResult::invalid(format!(
            "El cliente debe tener al menos {} años",
            EDAD_MINIMA
        ));
    }

    ValidationResult::valid_with(format!("{:02}/{:02}/{:04}", day, month, year))
}

/// Полных лет на дату `today`. День рождения 29/02 в невисокосный год
/// наступает 01/03.
fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let before_birthday = (today.month(), today.day()) < (birth.month(), birth.day());
    today.year() - birth.year() - i32::from(before_birthday)
}
