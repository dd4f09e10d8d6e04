//! u501: массовый импорт клиентов из Excel/CSV

pub mod excel;
pub mod request;
pub mod response;

pub use excel::{ColumnMapping, ParsedSheet, RawSheet};
pub use request::{ConfirmDuplicatesRequest, StartImportRequest, UpdateCellRequest};
pub use response::{
    BulkSaveReport, DuplicateConflictView, ImportSessionView, ImportSummary, RowStatus, RowView,
    SaveOutcome, SkipReason,
};

use crate::usecases::common::UseCaseMetadata;

pub struct ImportClientes;

impl UseCaseMetadata for ImportClientes {
    fn usecase_index() -> &'static str {
        "u501"
    }

    fn usecase_name() -> &'static str {
        "import_clientes"
    }

    fn display_name() -> &'static str {
        "Importación masiva de clientes"
    }

    fn description() -> &'static str {
        "Carga de clientes desde Excel/CSV con validación y control de duplicados"
    }
}
