//! Client import validation pipeline: normalizers, field rules, row
//! aggregation and duplicate detection.

pub mod duplicates;
pub mod field;
pub mod normalize;
pub mod row;
pub mod rules;

pub use duplicates::{detect_duplicates, DuplicateIndex, DuplicateReason};
pub use field::ClientField;
pub use normalize::{
    blank_if_nn, convertir_fecha_excel, convertir_fecha_para_backend, format_nombres, CellValue,
};
pub use row::ExcelRow;
pub use rules::{validate_field, validate_named, ValidationOptions, ValidationResult};
