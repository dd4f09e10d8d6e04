use chrono::{DateTime, Utc};
use contracts::domain::a001_cliente::{ClienteCreado, ClienteCreate};
use contracts::shared::notice::{Toast, ViolationTracker};
use contracts::shared::validation::duplicates::{normalized_cedula, DuplicateReason};
use contracts::shared::validation::rules::suggestion_for;
use contracts::shared::validation::{
    blank_if_nn, convertir_fecha_para_backend, detect_duplicates, ClientField, DuplicateIndex,
    ExcelRow, ValidationOptions,
};
use contracts::usecases::common::{UseCaseError, UseCaseResult};
use contracts::usecases::u501_import_clientes::{
    ColumnMapping, DuplicateConflictView, ImportSessionView, ImportSummary, ParsedSheet, RowStatus,
    RowView, SaveOutcome, SkipReason,
};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::clients_api_client::ClientsApiError;

/// Сколько последних уведомлений хранит сессия
const MAX_TOASTS: usize = 50;

/// Результат попытки начать сохранение строки
#[derive(Debug)]
pub enum SaveStart {
    Ready(ClienteCreate),
    Skip(SaveOutcome),
}

/// Состояние одной сессии импорта (одного загруженного файла).
///
/// `rows` - рабочий набор ещё не сохранённых строк, отсортирован по
/// `_rowIndex`. Сохранённые строки удаляются из него и попадают в
/// `saved_clients`, который только растёт.
pub struct ImportSession {
    pub id: String,
    pub file_name: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    column_mapping: Vec<ColumnMapping>,
    total_rows: usize,
    rows: Vec<ExcelRow>,
    saving_progress: HashSet<usize>,
    saved_clients: BTreeSet<usize>,
    failures: HashMap<usize, String>,
    existing_cedulas: HashSet<String>,
    confirmed_duplicates: HashMap<usize, String>,
    duplicates: DuplicateIndex,
    conflicts: VecDeque<DuplicateConflictView>,
    toasts: VecDeque<Toast>,
    violations: ViolationTracker,
    options: ValidationOptions,
}

impl ImportSession {
    pub fn new(
        id: String,
        parsed: ParsedSheet,
        existing_cedulas: HashSet<String>,
        options: ValidationOptions,
    ) -> Self {
        let mut rows = parsed.rows;
        rows.sort_by_key(|r| r.row_index);
        for row in rows.iter_mut() {
            row.validate_all(&options);
        }

        let now = Utc::now();
        let mut session = Self {
            id,
            file_name: parsed.file_name,
            started_at: now,
            updated_at: now,
            column_mapping: parsed.column_mapping,
            total_rows: rows.len(),
            rows,
            saving_progress: HashSet::new(),
            saved_clients: BTreeSet::new(),
            failures: HashMap::new(),
            existing_cedulas: existing_cedulas.iter().map(|c| normalized_cedula(c)).collect(),
            confirmed_duplicates: HashMap::new(),
            duplicates: DuplicateIndex::default(),
            conflicts: VecDeque::new(),
            toasts: VecDeque::new(),
            violations: ViolationTracker::new(),
            options,
        };
        session.recompute_duplicates();
        session.register_initial_violations();
        session
    }

    /// Existing violations are recorded silently; one summary toast is raised
    fn register_initial_violations(&mut self) {
        let mut invalid_rows = 0;
        for row in &self.rows {
            let fingerprint = row.data_fingerprint();
            let errors = row.errors();
            if !errors.is_empty() {
                invalid_rows += 1;
            }
            for (field, _) in errors {
                self.violations.should_notify(field, row.row_index, &fingerprint);
            }
        }

        if invalid_rows > 0 {
            self.notify(Toast::warning(format!(
                "{} de {} filas tienen errores de validación",
                invalid_rows, self.total_rows
            )));
        }
        let db_duplicates = self.duplicates.database_duplicates().len();
        if db_duplicates > 0 {
            self.notify(Toast::warning(format!(
                "{} filas tienen una cédula que ya existe en la base de datos",
                db_duplicates
            )));
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn notify(&mut self, toast: Toast) {
        self.toasts.push_back(toast);
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    fn position(&self, row_index: usize) -> Option<usize> {
        self.rows.binary_search_by_key(&row_index, |r| r.row_index).ok()
    }

    pub fn row(&self, row_index: usize) -> Option<&ExcelRow> {
        self.position(row_index).map(|pos| &self.rows[pos])
    }

    pub fn is_saved(&self, row_index: usize) -> bool {
        self.saved_clients.contains(&row_index)
    }

    pub fn is_saving(&self, row_index: usize) -> bool {
        self.saving_progress.contains(&row_index)
    }

    pub fn has_pending_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }

    fn recompute_duplicates(&mut self) {
        self.duplicates = detect_duplicates(&self.rows, &self.existing_cedulas);
    }

    fn not_found(row_index: usize) -> UseCaseError {
        UseCaseError::not_found(format!("Fila {} no encontrada en la importación", row_index))
    }

    pub fn row_status(&self, row_index: usize) -> Option<RowStatus> {
        if self.is_saved(row_index) {
            return Some(RowStatus::Saved);
        }
        let row = self.row(row_index)?;
        Some(if self.is_saving(row_index) {
            RowStatus::Saving
        } else if self.failures.contains_key(&row_index) {
            RowStatus::Failed
        } else if row.has_errors() {
            RowStatus::Invalid
        } else {
            RowStatus::Valid
        })
    }

    /// Правка ячейки: перепроверяется только изменённое поле
    pub fn update_cell(&mut self, row_index: usize, field: ClientField, value: &str) -> UseCaseResult<()> {
        if self.is_saved(row_index) {
            return Err(UseCaseError::conflict(format!("La fila {} ya fue guardada", row_index)));
        }
        if self.is_saving(row_index) {
            return Err(UseCaseError::conflict(format!(
                "La fila {} se está guardando; espere a que termine",
                row_index
            )));
        }
        let pos = self.position(row_index).ok_or_else(|| Self::not_found(row_index))?;

        let options = self.options.clone();
        let row = &mut self.rows[pos];
        let result = row.update_field(field, value, &options).clone();
        let fingerprint = row.data_fingerprint();

        self.failures.remove(&row_index);
        if field == ClientField::Cedula {
            // старое подтверждение и окно конфликта относятся к прежней cédula
            self.confirmed_duplicates.remove(&row_index);
            self.conflicts.retain(|c| c.row_index != row_index);
        }
        self.recompute_duplicates();

        if !result.is_valid {
            if self.violations.should_notify(field, row_index, &fingerprint) {
                let message = result.message.unwrap_or_default();
                self.notify(
                    Toast::error(format!("Fila {}: {}", row_index, message))
                        .for_row(row_index)
                        .for_field(field)
                        .with_suggestion(suggestion_for(field)),
                );
            }
        } else {
            self.violations.clear(field, row_index);
            if let Some(warning) = result.message {
                self.notify(
                    Toast::warning(format!("Fila {}: {}", row_index, warning))
                        .for_row(row_index)
                        .for_field(field),
                );
            }
        }

        self.touch();
        Ok(())
    }

    /// Удаляет строку из рабочего набора без сохранения
    pub fn remove_row(&mut self, row_index: usize) -> UseCaseResult<()> {
        if self.is_saving(row_index) {
            return Err(UseCaseError::conflict(format!(
                "La fila {} se está guardando",
                row_index
            )));
        }
        let pos = self.position(row_index).ok_or_else(|| Self::not_found(row_index))?;
        self.rows.remove(pos);
        self.forget_row(row_index);
        self.recompute_duplicates();
        self.touch();
        Ok(())
    }

    fn forget_row(&mut self, row_index: usize) {
        self.failures.remove(&row_index);
        self.confirmed_duplicates.remove(&row_index);
        self.violations.clear_row(row_index);
        self.conflicts.retain(|c| c.row_index != row_index);
    }

    /// Строки для массового сохранения: валидные и без неподтверждённого
    /// дубликата в базе
    pub fn rows_for_bulk_save(&self) -> Vec<usize> {
        self.rows
            .iter()
            .filter(|r| !r.has_errors())
            .filter(|r| !self.is_saving(r.row_index))
            .filter(|r| {
                !self.duplicates.is_database_duplicate(r.row_index)
                    || self.confirmed_duplicates.contains_key(&r.row_index)
            })
            .map(|r| r.row_index)
            .collect()
    }

    /// Rows the bulk save leaves for an explicit decision
    pub fn unconfirmed_database_duplicates(&self) -> Vec<usize> {
        self.duplicates
            .database_duplicates()
            .into_iter()
            .filter(|idx| !self.confirmed_duplicates.contains_key(idx))
            .collect()
    }

    /// Проверки перед сохранением и перевод строки в состояние saving
    pub fn begin_save(&mut self, row_index: usize, bulk: bool) -> UseCaseResult<SaveStart> {
        let skip = |reason| Ok(SaveStart::Skip(SaveOutcome::Skipped { row_index, reason }));

        if self.is_saved(row_index) {
            return skip(SkipReason::AlreadySaved);
        }
        let row = self.row(row_index).ok_or_else(|| Self::not_found(row_index))?;
        if self.is_saving(row_index) {
            return skip(SkipReason::AlreadySaving);
        }
        if row.has_errors() {
            return skip(SkipReason::Invalid);
        }
        let comentario = self.confirmed_duplicates.get(&row_index);
        if bulk && self.duplicates.is_database_duplicate(row_index) && comentario.is_none() {
            return skip(SkipReason::UnconfirmedDuplicate);
        }

        let payload = build_payload(row, comentario.map(String::as_str));
        self.saving_progress.insert(row_index);
        self.touch();
        Ok(SaveStart::Ready(payload))
    }

    /// Применяет ответ сервера к строке
    pub fn finish_save(
        &mut self,
        row_index: usize,
        payload: ClienteCreate,
        result: Result<ClienteCreado, ClientsApiError>,
    ) -> SaveOutcome {
        self.saving_progress.remove(&row_index);
        self.touch();

        match result {
            Ok(cliente) => {
                self.saved_clients.insert(row_index);
                if let Some(pos) = self.position(row_index) {
                    self.rows.remove(pos);
                }
                self.forget_row(row_index);
                let cedula = normalized_cedula(&payload.cedula);
                if !cedula.is_empty() {
                    self.existing_cedulas.insert(cedula);
                }
                self.recompute_duplicates();
                self.notify(
                    Toast::success(format!("Cliente {} guardado", cliente.nombres))
                        .for_row(row_index),
                );
                SaveOutcome::Saved { row_index, cliente }
            }
            Err(ClientsApiError::Duplicate(conflicto)) => {
                let conflicto = *conflicto;
                self.existing_cedulas
                    .insert(normalized_cedula(&conflicto.cliente_existente.cedula));
                self.recompute_duplicates();
                self.confirmed_duplicates.remove(&row_index);
                self.conflicts.retain(|c| c.row_index != row_index);
                self.conflicts.push_back(DuplicateConflictView {
                    row_index,
                    conflicto: conflicto.clone(),
                    cliente_nuevo: payload,
                });
                self.notify(
                    Toast::warning(format!(
                        "Fila {}: ya existe un cliente con la cédula {}",
                        row_index, conflicto.cliente_existente.cedula
                    ))
                    .for_row(row_index)
                    .for_field(ClientField::Cedula),
                );
                SaveOutcome::Conflict { row_index, conflicto }
            }
            Err(e) => self.fail_save(row_index, e.to_string()),
        }
    }

    /// Ошибка без ответа сервера; строка остаётся для повторной попытки
    pub fn fail_save(&mut self, row_index: usize, message: String) -> SaveOutcome {
        self.saving_progress.remove(&row_index);
        self.failures.insert(row_index, message.clone());
        self.notify(
            Toast::error(format!("Fila {}: no se pudo guardar el cliente", row_index))
                .for_row(row_index)
                .with_suggestion(Some("Revise la conexión y vuelva a intentarlo")),
        );
        self.touch();
        SaveOutcome::Failed { row_index, message }
    }

    /// Фиксирует подтверждение пользователя с обоснованием
    pub fn confirm_duplicates(&mut self, row_indices: &[usize], comentario: &str) -> UseCaseResult<Vec<usize>> {
        let comentario = comentario.trim();
        if comentario.is_empty() {
            return Err(UseCaseError::validation(
                "Debe indicar un comentario que justifique guardar el duplicado",
            ));
        }
        if row_indices.is_empty() {
            return Err(UseCaseError::validation("No se indicaron filas para confirmar"));
        }

        let mut confirmed = Vec::with_capacity(row_indices.len());
        for &row_index in row_indices {
            if self.is_saved(row_index) {
                continue;
            }
            if self.row(row_index).is_none() {
                return Err(Self::not_found(row_index));
            }
            self.confirmed_duplicates.insert(row_index, comentario.to_string());
            self.conflicts.retain(|c| c.row_index != row_index);
            confirmed.push(row_index);
        }
        self.touch();
        Ok(confirmed)
    }

    /// Закрывает текущее окно подтверждения; строка остаётся в наборе
    pub fn dismiss_conflict(&mut self) -> Option<usize> {
        let dismissed = self.conflicts.pop_front().map(|c| c.row_index);
        self.touch();
        dismissed
    }

    /// Исключает из импорта строки, чья cédula уже есть в базе
    pub fn omit_existing_cedulas(&mut self) -> Vec<usize> {
        let omitted: Vec<usize> = self
            .unconfirmed_database_duplicates()
            .into_iter()
            .filter(|idx| !self.is_saving(*idx))
            .collect();
        if omitted.is_empty() {
            return omitted;
        }

        self.rows.retain(|r| !omitted.contains(&r.row_index));
        for idx in &omitted {
            self.forget_row(*idx);
        }
        self.recompute_duplicates();
        self.notify(Toast::success(format!(
            "Se omitieron {} filas con cédula existente",
            omitted.len()
        )));
        self.touch();
        omitted
    }

    pub fn dismiss_toast(&mut self, toast_id: &str) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != toast_id);
        before != self.toasts.len()
    }

    pub fn summary(&self) -> ImportSummary {
        let mut summary = ImportSummary {
            total_rows: self.total_rows,
            pending: self.rows.len(),
            saved: self.saved_clients.len(),
            saving: self.saving_progress.len(),
            failed: self.failures.len(),
            ..Default::default()
        };
        for row in &self.rows {
            if row.has_errors() {
                summary.invalid += 1;
            } else {
                summary.valid += 1;
            }
            let reasons = self.duplicates.reasons(row.row_index);
            if reasons.iter().any(|r| *r != DuplicateReason::ExistingInDatabase) {
                summary.duplicated_in_file += 1;
            }
            if reasons.contains(&DuplicateReason::ExistingInDatabase) {
                summary.database_duplicates += 1;
            }
        }
        summary
    }

    pub fn view(&self) -> ImportSessionView {
        let rows = self
            .rows
            .iter()
            .map(|row| RowView {
                row: row.clone(),
                status: self.row_status(row.row_index).unwrap_or(RowStatus::Invalid),
                duplicate_reasons: self.duplicates.reasons(row.row_index).to_vec(),
                duplicado_motivo: self.duplicates.duplicado_motivo(row.row_index),
                duplicate_confirmed: self.confirmed_duplicates.contains_key(&row.row_index),
                last_error: self.failures.get(&row.row_index).cloned(),
            })
            .collect();

        ImportSessionView {
            session_id: self.id.clone(),
            file_name: self.file_name.clone(),
            started_at: self.started_at,
            updated_at: self.updated_at,
            column_mapping: self.column_mapping.clone(),
            rows,
            saved_clients: self.saved_clients.iter().copied().collect(),
            summary: self.summary(),
            toasts: self.toasts.iter().cloned().collect(),
            pending_conflict: self.conflicts.front().cloned(),
        }
    }
}

/// Тело запроса создания клиента из проверенной строки
fn build_payload(row: &ExcelRow, comentario: Option<&str>) -> ClienteCreate {
    let value = |field| blank_if_nn(&row.normalized(field));
    let notas = value(ClientField::Notas);

    ClienteCreate {
        cedula: value(ClientField::Cedula),
        nombres: value(ClientField::Nombres),
        telefono: value(ClientField::Telefono),
        email: value(ClientField::Email),
        direccion: value(ClientField::Direccion),
        fecha_nacimiento: convertir_fecha_para_backend(&value(ClientField::FechaNacimiento)),
        ocupacion: value(ClientField::Ocupacion),
        estado: value(ClientField::Estado),
        // "NN" / vacío -> activo por defecto
        activo: value(ClientField::Activo) != "false",
        notas: (!notas.is_empty()).then_some(notas),
        confirmar_duplicado: comentario.is_some(),
        comentario: comentario.map(str::to_string),
    }
}
