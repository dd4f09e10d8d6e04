use super::clients_api_client::ClientsApi;
use super::csv_reader;
use super::session::{ImportSession, SaveStart};
use super::session_store::{SessionStore, SharedSession};
use chrono::NaiveDate;
use contracts::shared::notice::Toast;
use contracts::shared::validation::duplicates::normalized_cedula;
use contracts::shared::validation::ValidationOptions;
use contracts::usecases::common::{UseCaseError, UseCaseResult};
use contracts::usecases::u501_import_clientes::{
    BulkSaveReport, ConfirmDuplicatesRequest, ImportSessionView, RawSheet, SaveOutcome,
    StartImportRequest, UpdateCellRequest,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::shared::config::{SessionsConfig, ValidationConfig};
use crate::shared::throttle::RequestThrottler;

/// Одиночное сохранение обгоняет очередь массового
const INDIVIDUAL_SAVE_PRIORITY: i32 = 10;

/// Executor для UseCase массового импорта клиентов
pub struct ImportExecutor {
    api: Arc<dyn ClientsApi>,
    throttler: RequestThrottler,
    store: SessionStore,
    estados: Vec<String>,
    /// Фиксированная дата для проверок возраста; `None` - текущая дата
    today: Option<NaiveDate>,
}

impl ImportExecutor {
    pub fn new(api: Arc<dyn ClientsApi>, throttler: RequestThrottler, validation: &ValidationConfig) -> Self {
        Self {
            api,
            throttler,
            store: SessionStore::new(),
            estados: validation.estados.clone(),
            today: None,
        }
    }

    #[cfg(test)]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn validation_options(&self) -> ValidationOptions {
        let options = ValidationOptions::default().with_estados(self.estados.clone());
        match self.today {
            Some(today) => options.with_today(today),
            None => options,
        }
    }

    async fn session(&self, session_id: &str) -> UseCaseResult<SharedSession> {
        self.store.get(session_id).await.ok_or_else(|| {
            UseCaseError::not_found(format!("Sesión de importación {} no encontrada", session_id))
        })
    }

    /// Создать сессию из листа, разобранного на клиенте
    pub async fn start_import(&self, request: StartImportRequest) -> UseCaseResult<ImportSessionView> {
        tracing::info!(
            "Starting client import '{}' ({} rows incl. header)",
            request.file_name,
            request.rows.len()
        );
        let sheet = RawSheet::from_json(request.file_name, &request.rows);
        self.open_session(sheet).await
    }

    /// Создать сессию из загруженного CSV
    pub async fn start_import_csv(&self, file_name: &str, data: &[u8]) -> UseCaseResult<ImportSessionView> {
        tracing::info!("Starting client import from CSV '{}' ({} bytes)", file_name, data.len());
        let sheet = csv_reader::read_csv(file_name, data)
            .map_err(|e| UseCaseError::validation(format!("No se pudo leer el archivo CSV: {}", e)))?;
        self.open_session(sheet).await
    }

    async fn open_session(&self, sheet: RawSheet) -> UseCaseResult<ImportSessionView> {
        let parsed = sheet.into_rows().map_err(UseCaseError::validation)?;
        if parsed.rows.is_empty() {
            return Err(UseCaseError::validation("El archivo no contiene filas de datos"));
        }

        let missing: Vec<String> = parsed.missing_columns().into_iter().map(str::to_string).collect();
        if !missing.is_empty() {
            tracing::warn!("Import '{}': unmapped columns {:?}", parsed.file_name, missing);
        }
        let ignored = parsed.ignored_headers();
        if !ignored.is_empty() {
            tracing::info!("Import '{}': ignored file columns {:?}", parsed.file_name, ignored);
        }

        let cedulas: Vec<String> = parsed
            .rows
            .iter()
            .map(|r| normalized_cedula(&r.cedula))
            .filter(|c| !c.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (existing, lookup_failed) = match self.api.existing_cedulas(&cedulas).await {
            Ok(existing) => {
                tracing::info!("{} of {} cedulas already exist", existing.len(), cedulas.len());
                (existing, false)
            }
            Err(e) if e.is_auth_rejected() => {
                // без доступа к API ни одна строка не сохранится
                tracing::error!("Clients API rejected the service credentials: {}", e);
                return Err(e.into());
            }
            Err(e) => {
                tracing::warn!("Existing cedula lookup failed, continuing without it: {}", e);
                (Vec::new(), true)
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let mut session = ImportSession::new(
            session_id.clone(),
            parsed,
            existing.into_iter().collect(),
            self.validation_options(),
        );

        if !missing.is_empty() {
            session.notify(
                Toast::warning(format!("Columnas no encontradas en el archivo: {}", missing.join(", ")))
                    .with_suggestion(Some("Revise los encabezados de la plantilla")),
            );
        }
        if lookup_failed {
            session.notify(Toast::warning(
                "No se pudo verificar qué cédulas ya existen; el servidor las rechazará al guardar",
            ));
        }

        let view = session.view();
        self.store.insert(session).await;
        tracing::info!(
            "Import session {} created: {} rows, {} invalid",
            session_id,
            view.summary.total_rows,
            view.summary.invalid
        );
        Ok(view)
    }

    pub async fn get_session(&self, session_id: &str) -> UseCaseResult<ImportSessionView> {
        Ok(self.session(session_id).await?.lock().await.view())
    }

    pub async fn update_cell(
        &self,
        session_id: &str,
        row_index: usize,
        request: UpdateCellRequest,
    ) -> UseCaseResult<ImportSessionView> {
        let shared = self.session(session_id).await?;
        let mut session = shared.lock().await;
        session.update_cell(row_index, request.field, &request.value)?;
        Ok(session.view())
    }

    pub async fn remove_row(&self, session_id: &str, row_index: usize) -> UseCaseResult<ImportSessionView> {
        let shared = self.session(session_id).await?;
        let mut session = shared.lock().await;
        session.remove_row(row_index)?;
        tracing::debug!("Session {}: row {} removed", session_id, row_index);
        Ok(session.view())
    }

    /// Сохранить одну строку. Сохранённая или уже сохраняемая строка
    /// повторно не отправляется.
    pub async fn save_individual_client(&self, session_id: &str, row_index: usize) -> UseCaseResult<SaveOutcome> {
        let shared = self.session(session_id).await?;

        let payload = match shared.lock().await.begin_save(row_index, false)? {
            SaveStart::Ready(payload) => payload,
            SaveStart::Skip(outcome) => {
                tracing::debug!("Session {}: row {} not submitted: {:?}", session_id, row_index, outcome);
                return Ok(outcome);
            }
        };

        let api = self.api.clone();
        let request = payload.clone();
        let result = self
            .throttler
            .execute(INDIVIDUAL_SAVE_PRIORITY, move || async move {
                api.create_client(&request).await
            })
            .await;

        let mut session = shared.lock().await;
        let outcome = match result {
            Ok(result) => session.finish_save(row_index, payload, result),
            Err(e) => session.fail_save(row_index, e.to_string()),
        };
        log_outcome(session_id, &outcome);
        Ok(outcome)
    }

    /// Сохранить все валидные строки через ограничитель запросов
    pub async fn save_all_valid_clients(&self, session_id: &str) -> UseCaseResult<BulkSaveReport> {
        let shared = self.session(session_id).await?;
        let (candidates, held_back) = {
            let session = shared.lock().await;
            (session.rows_for_bulk_save(), session.unconfirmed_database_duplicates())
        };
        tracing::info!(
            "Session {}: bulk save of {} rows ({} database duplicates held back)",
            session_id,
            candidates.len(),
            held_back.len()
        );

        let report = self.save_rows(session_id, &shared, candidates).await;

        if !held_back.is_empty() {
            shared.lock().await.notify(
                Toast::warning(format!(
                    "{} filas tienen una cédula existente y esperan su confirmación",
                    held_back.len()
                ))
                .with_suggestion(Some("Confirme con un comentario u omita esas filas")),
            );
        }
        Ok(report)
    }

    /// Подтверждение строк с существующей cédula и их сохранение
    pub async fn confirm_save_omitting_existing_cedulas(
        &self,
        session_id: &str,
        request: ConfirmDuplicatesRequest,
    ) -> UseCaseResult<BulkSaveReport> {
        let shared = self.session(session_id).await?;
        let confirmed = shared
            .lock()
            .await
            .confirm_duplicates(&request.row_indices, &request.comentario)?;
        tracing::info!(
            "Session {}: {} duplicate rows confirmed by user",
            session_id,
            confirmed.len()
        );

        Ok(self.save_rows(session_id, &shared, confirmed).await)
    }

    async fn save_rows(&self, session_id: &str, shared: &SharedSession, rows: Vec<usize>) -> BulkSaveReport {
        let mut report = BulkSaveReport::default();
        let mut ready = Vec::new();
        {
            let mut session = shared.lock().await;
            for row_index in rows {
                match session.begin_save(row_index, true) {
                    Ok(SaveStart::Ready(payload)) => ready.push((row_index, payload)),
                    Ok(SaveStart::Skip(outcome)) => report.push(outcome),
                    Err(e) => report.push(SaveOutcome::Failed {
                        row_index,
                        message: e.message,
                    }),
                }
            }
        }

        let indices: Vec<usize> = ready.iter().map(|(idx, _)| *idx).collect();
        let tasks: Vec<_> = ready
            .into_iter()
            .map(|(row_index, payload)| {
                let api = self.api.clone();
                let shared = shared.clone();
                move || async move {
                    let result = api.create_client(&payload).await;
                    shared.lock().await.finish_save(row_index, payload, result)
                }
            })
            .collect();

        let results = self.throttler.execute_batch(tasks).await;

        let mut session = shared.lock().await;
        for (row_index, result) in indices.into_iter().zip(results) {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => session.fail_save(row_index, e.to_string()),
            };
            log_outcome(session_id, &outcome);
            report.push(outcome);
        }

        if report.attempted > 0 {
            let toast = if report.saved == report.attempted {
                Toast::success(format!("Se guardaron {} clientes", report.saved))
            } else {
                Toast::warning(format!(
                    "Se guardaron {} de {} clientes ({} con duplicado, {} con error)",
                    report.saved, report.attempted, report.conflicts, report.failed
                ))
            };
            session.notify(toast);
        }

        tracing::info!(
            "Session {}: bulk save finished: attempted={}, saved={}, conflicts={}, failed={}, skipped={}",
            session_id,
            report.attempted,
            report.saved,
            report.conflicts,
            report.failed,
            report.skipped
        );
        report
    }

    pub async fn dismiss_conflict(&self, session_id: &str) -> UseCaseResult<ImportSessionView> {
        let shared = self.session(session_id).await?;
        let mut session = shared.lock().await;
        if !session.has_pending_conflict() {
            return Err(UseCaseError::not_found("No hay ninguna confirmación pendiente"));
        }
        session.dismiss_conflict();
        Ok(session.view())
    }

    /// Исключить строки, чья cédula уже есть в базе
    pub async fn omit_existing_cedulas(&self, session_id: &str) -> UseCaseResult<ImportSessionView> {
        let shared = self.session(session_id).await?;
        let mut session = shared.lock().await;
        let omitted = session.omit_existing_cedulas();
        tracing::info!("Session {}: {} rows with existing cedula omitted", session_id, omitted.len());
        Ok(session.view())
    }

    pub async fn dismiss_toast(&self, session_id: &str, toast_id: &str) -> UseCaseResult<ImportSessionView> {
        let shared = self.session(session_id).await?;
        let mut session = shared.lock().await;
        if !session.dismiss_toast(toast_id) {
            return Err(UseCaseError::not_found(format!("Notificación {} no encontrada", toast_id)));
        }
        Ok(session.view())
    }

    /// Удаляет сессии, брошенные без закрытия
    pub async fn cleanup_old_sessions(&self, max_age_hours: i64) -> usize {
        let removed = self.store.cleanup_old_sessions(max_age_hours).await;
        if removed > 0 {
            tracing::info!("Removed {} idle import sessions (older than {}h)", removed, max_age_hours);
        }
        removed
    }

    /// Фоновый цикл очистки сессий (запускается из main)
    pub async fn run_session_cleanup(&self, config: SessionsConfig) {
        tracing::info!(
            "Session cleanup started: every {} min, max age {}h",
            config.cleanup_interval_minutes,
            config.max_age_hours
        );
        let mut interval = tokio::time::interval(config.cleanup_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.cleanup_old_sessions(config.max_age_hours).await;
        }
    }

    /// Закрыть сессию; незавершённые запросы доработают без неё
    pub async fn close_session(&self, session_id: &str) -> UseCaseResult<()> {
        match self.store.remove(session_id).await {
            Some(_) => {
                tracing::info!("Import session {} closed", session_id);
                Ok(())
            }
            None => Err(UseCaseError::not_found(format!(
                "Sesión de importación {} no encontrada",
                session_id
            ))),
        }
    }
}

fn log_outcome(session_id: &str, outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Saved { row_index, cliente } => {
            tracing::info!("Session {}: row {} saved as client {}", session_id, row_index, cliente.id)
        }
        SaveOutcome::Conflict { row_index, conflicto } => tracing::warn!(
            "Session {}: row {} conflicts with existing client {}",
            session_id,
            row_index,
            conflicto.cliente_existente.id
        ),
        SaveOutcome::Failed { row_index, message } => {
            tracing::error!("Session {}: row {} failed: {}", session_id, row_index, message)
        }
        SaveOutcome::Skipped { row_index, reason } => {
            tracing::debug!("Session {}: row {} skipped: {:?}", session_id, row_index, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::ThrottleConfig;
    use crate::usecases::u501_import_clientes::clients_api_client::ClientsApiError;
    use async_trait::async_trait;
    use contracts::domain::a001_cliente::{
        ClienteCreado, ClienteCreate, ClienteExistente, ConflictoDuplicado, PrestamoResumen,
    };
    use contracts::shared::notice::ToastKind;
    use contracts::shared::validation::ClientField;
    use contracts::usecases::common::{CONFLICT, EXTERNAL_ERROR, NOT_FOUND, VALIDATION_ERROR};
    use contracts::usecases::u501_import_clientes::{RowStatus, SkipReason};
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory stand-in for the clients REST API
    #[derive(Default)]
    struct FakeClientsApi {
        existing: Vec<String>,
        lookup_fails: bool,
        lookup_rejects_token: bool,
        /// create_client answers 409 for these cedulas unless confirmed
        conflicts: HashSet<String>,
        /// number of upcoming create calls that fail with a network error
        failures_left: AtomicUsize,
        delay: Duration,
        created: Mutex<Vec<ClienteCreate>>,
        next_id: AtomicI64,
    }

    impl FakeClientsApi {
        fn created(&self) -> Vec<ClienteCreate> {
            self.created.lock().unwrap().clone()
        }

        fn created_count(&self, cedula: &str) -> usize {
            self.created().iter().filter(|c| c.cedula == cedula).count()
        }
    }

    #[async_trait]
    impl ClientsApi for FakeClientsApi {
        async fn create_client(&self, payload: &ClienteCreate) -> Result<ClienteCreado, ClientsApiError> {
            self.created.lock().unwrap().push(payload.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ClientsApiError::Network("connection reset".into()));
            }
            if self.conflicts.contains(&payload.cedula) && !payload.confirmar_duplicado {
                return Err(ClientsApiError::Duplicate(Box::new(ConflictoDuplicado {
                    cliente_existente: ClienteExistente {
                        id: 500,
                        nombres: "Cliente Existente".into(),
                        cedula: payload.cedula.clone(),
                        telefono: "4120000000".into(),
                        email: "existente@correo.com".into(),
                        fecha_registro: Some("2024-01-10".into()),
                    },
                    prestamos: vec![PrestamoResumen {
                        id: 7,
                        estado: "APROBADO".into(),
                        total_financiamiento: Some(1500.0),
                        fecha_registro: None,
                    }],
                })));
            }

            Ok(ClienteCreado {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                cedula: payload.cedula.clone(),
                nombres: payload.nombres.clone(),
            })
        }

        async fn existing_cedulas(&self, cedulas: &[String]) -> Result<Vec<String>, ClientsApiError> {
            if self.lookup_rejects_token {
                return Err(ClientsApiError::Http {
                    status: 401,
                    message: "token expired".into(),
                });
            }
            if self.lookup_fails {
                return Err(ClientsApiError::Http {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(cedulas
                .iter()
                .filter(|c| self.existing.contains(c))
                .cloned()
                .collect())
        }
    }

    fn executor(api: Arc<FakeClientsApi>) -> ImportExecutor {
        let throttler = RequestThrottler::new(ThrottleConfig {
            max_concurrent: 2,
            batch_delay_ms: 1,
            batch_size: 2,
            inter_batch_delay_ms: 1,
        });
        ImportExecutor::new(api, throttler, &ValidationConfig::default())
            .with_today(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap())
    }

    fn client(cedula: &str, nombres: &str, telefono: &str, email: &str) -> Vec<Value> {
        vec![
            json!(cedula),
            json!(nombres),
            json!(telefono),
            json!(email),
            json!("Av. Bolivar, Caracas"),
            json!(32874),
            json!("Comerciante"),
            json!("activo"),
            json!(true),
            Value::Null,
        ]
    }

    fn request(clients: Vec<Vec<Value>>) -> StartImportRequest {
        let header = [
            "Cédula",
            "Nombres",
            "Teléfono",
            "Email",
            "Dirección",
            "Fecha de nacimiento",
            "Ocupación",
            "Estado",
            "Activo",
            "Notas",
        ]
        .iter()
        .map(|h| json!(h))
        .collect();
        let mut rows = vec![header];
        rows.extend(clients);
        StartImportRequest {
            file_name: "clientes.xlsx".into(),
            rows,
        }
    }

    fn standard_file() -> StartImportRequest {
        request(vec![
            client("V12345678", "ana diaz", "4121234567", "ana@correo.com"),
            client("V23456789", "Luis Rojas", "4141234567", "luis@correo.com"),
            client("X1", "Pedro", "0412", "pedro"),
            client("E8765432", "Maria Perez", "4161234567", "maria@correo.com"),
        ])
    }

    #[tokio::test]
    async fn test_start_import_flags_database_duplicates() {
        let api = Arc::new(FakeClientsApi {
            existing: vec!["E8765432".into()],
            ..Default::default()
        });
        let exec = executor(api);

        let view = exec.start_import(standard_file()).await.unwrap();
        assert_eq!(view.summary.total_rows, 4);
        assert_eq!(view.summary.invalid, 1);
        assert_eq!(view.summary.database_duplicates, 1);
        assert_eq!(view.rows[0].row.get(ClientField::Nombres), "Ana Diaz");
        assert_eq!(view.rows[0].row.get(ClientField::FechaNacimiento), "01/01/1990");
        assert_eq!(view.rows[2].status, RowStatus::Invalid);
        assert!(view.rows[3].duplicado_motivo.is_some());

        let again = exec.get_session(&view.session_id).await.unwrap();
        assert_eq!(again.rows.len(), 4);
    }

    #[tokio::test]
    async fn test_lookup_failure_does_not_abort_import() {
        let api = Arc::new(FakeClientsApi {
            lookup_fails: true,
            ..Default::default()
        });
        let view = executor(api).start_import(standard_file()).await.unwrap();
        assert_eq!(view.summary.database_duplicates, 0);
        assert!(view
            .toasts
            .iter()
            .any(|t| t.kind == ToastKind::Warning && t.message.contains("cédulas")));
    }

    #[tokio::test]
    async fn test_rejected_credentials_abort_import() {
        let api = Arc::new(FakeClientsApi {
            lookup_rejects_token: true,
            ..Default::default()
        });
        let err = executor(api.clone()).start_import(standard_file()).await.unwrap_err();
        assert!(err.is(EXTERNAL_ERROR));
        assert!(err.details.unwrap_or_default().contains("401"));
        assert!(api.created().is_empty());
    }

    #[tokio::test]
    async fn test_empty_file_is_rejected() {
        let exec = executor(Arc::new(FakeClientsApi::default()));
        let err = exec.start_import(request(vec![])).await.unwrap_err();
        assert!(err.is(VALIDATION_ERROR));

        let err = exec
            .start_import(StartImportRequest {
                file_name: "vacio.xlsx".into(),
                rows: vec![],
            })
            .await
            .unwrap_err();
        assert!(err.is(VALIDATION_ERROR));
    }

    #[tokio::test]
    async fn test_saved_row_is_never_resubmitted() {
        let api = Arc::new(FakeClientsApi::default());
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let first = exec.save_individual_client(&session_id, 1).await.unwrap();
        assert!(first.is_saved());
        let second = exec.save_individual_client(&session_id, 1).await.unwrap();
        assert_eq!(
            second,
            SaveOutcome::Skipped {
                row_index: 1,
                reason: SkipReason::AlreadySaved
            }
        );
        exec.save_all_valid_clients(&session_id).await.unwrap();

        assert_eq!(api.created_count("V12345678"), 1);
        let view = exec.get_session(&session_id).await.unwrap();
        assert!(view.saved_clients.contains(&1));
        assert!(view.rows.iter().all(|r| r.row.row_index != 1));
    }

    #[tokio::test]
    async fn test_concurrent_saves_of_one_row_send_one_request() {
        let api = Arc::new(FakeClientsApi {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let exec = Arc::new(executor(api.clone()));
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let (a, b) = tokio::join!(
            exec.save_individual_client(&session_id, 2),
            exec.save_individual_client(&session_id, 2)
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| o.is_saved()).count(), 1);
        assert!(outcomes.contains(&SaveOutcome::Skipped {
            row_index: 2,
            reason: SkipReason::AlreadySaving
        }));
        assert_eq!(api.created_count("V23456789"), 1);
    }

    #[tokio::test]
    async fn test_invalid_row_is_refused() {
        let api = Arc::new(FakeClientsApi::default());
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let outcome = exec.save_individual_client(&session_id, 3).await.unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Skipped {
                row_index: 3,
                reason: SkipReason::Invalid
            }
        );
        assert!(api.created().is_empty());

        let err = exec.save_individual_client(&session_id, 99).await.unwrap_err();
        assert!(err.is(NOT_FOUND));
    }

    #[tokio::test]
    async fn test_save_all_skips_invalid_and_unconfirmed_duplicates() {
        let api = Arc::new(FakeClientsApi {
            existing: vec!["E8765432".into()],
            ..Default::default()
        });
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let report = exec.save_all_valid_clients(&session_id).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.saved, 2);

        let sent: HashSet<String> = api.created().into_iter().map(|c| c.cedula).collect();
        assert_eq!(sent, HashSet::from(["V12345678".to_string(), "V23456789".to_string()]));

        let view = exec.get_session(&session_id).await.unwrap();
        assert_eq!(view.saved_clients, vec![1, 2]);
        assert_eq!(view.summary.pending, 2);
        assert!(view
            .toasts
            .iter()
            .any(|t| t.message.contains("esperan su confirmación")));
    }

    #[tokio::test]
    async fn test_confirm_requires_comment_and_forwards_it() {
        let api = Arc::new(FakeClientsApi {
            existing: vec!["E8765432".into()],
            ..Default::default()
        });
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let err = exec
            .confirm_save_omitting_existing_cedulas(
                &session_id,
                ConfirmDuplicatesRequest {
                    row_indices: vec![4],
                    comentario: "  ".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(VALIDATION_ERROR));
        assert!(api.created().is_empty());

        let report = exec
            .confirm_save_omitting_existing_cedulas(
                &session_id,
                ConfirmDuplicatesRequest {
                    row_indices: vec![4],
                    comentario: "Cliente recurrente, nuevo préstamo".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.saved, 1);

        let sent = api.created();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].confirmar_duplicado);
        assert_eq!(sent[0].comentario.as_deref(), Some("Cliente recurrente, nuevo préstamo"));
    }

    #[tokio::test]
    async fn test_server_conflict_opens_confirmation() {
        let api = Arc::new(FakeClientsApi {
            conflicts: HashSet::from(["V12345678".to_string()]),
            ..Default::default()
        });
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let outcome = exec.save_individual_client(&session_id, 1).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Conflict { row_index: 1, .. }));

        let view = exec.get_session(&session_id).await.unwrap();
        let conflict = view.pending_conflict.expect("confirmation should be open");
        assert_eq!(conflict.conflicto.cliente_existente.id, 500);
        assert_eq!(conflict.conflicto.prestamos.len(), 1);
        assert_eq!(conflict.cliente_nuevo.nombres, "Ana Diaz");

        // bulk save now holds the row back
        let report = exec.save_all_valid_clients(&session_id).await.unwrap();
        assert!(report.outcomes.iter().all(|o| o.row_index() != 1));

        let view = exec.dismiss_conflict(&session_id).await.unwrap();
        assert!(view.pending_conflict.is_none());
        assert!(view.rows.iter().any(|r| r.row.row_index == 1));
    }

    #[tokio::test]
    async fn test_network_failure_keeps_row_for_retry() {
        let api = Arc::new(FakeClientsApi {
            failures_left: AtomicUsize::new(1),
            ..Default::default()
        });
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let outcome = exec.save_individual_client(&session_id, 2).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Failed { row_index: 2, .. }));
        let view = exec.get_session(&session_id).await.unwrap();
        let row = view.rows.iter().find(|r| r.row.row_index == 2).unwrap();
        assert_eq!(row.status, RowStatus::Failed);
        assert!(view
            .toasts
            .iter()
            .any(|t| t.kind == ToastKind::Error && t.row_index == Some(2)));

        let retry = exec.save_individual_client(&session_id, 2).await.unwrap();
        assert!(retry.is_saved());
        assert_eq!(api.created_count("V23456789"), 2);
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted() {
        let exec = executor(Arc::new(FakeClientsApi::default()));
        let idle = exec.start_import(standard_file()).await.unwrap().session_id;
        let active = exec.start_import(standard_file()).await.unwrap().session_id;

        exec.store.get(&idle).await.unwrap().lock().await.updated_at =
            chrono::Utc::now() - chrono::Duration::hours(25);

        assert_eq!(exec.cleanup_old_sessions(24).await, 1);
        assert!(exec.get_session(&idle).await.unwrap_err().is(NOT_FOUND));
        assert!(exec.get_session(&active).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_loop_runs_on_first_tick() {
        let exec = Arc::new(executor(Arc::new(FakeClientsApi::default())));
        let idle = exec.start_import(standard_file()).await.unwrap().session_id;
        exec.store.get(&idle).await.unwrap().lock().await.updated_at =
            chrono::Utc::now() - chrono::Duration::hours(48);

        let background = exec.clone();
        tokio::spawn(async move { background.run_session_cleanup(SessionsConfig::default()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(exec.get_session(&idle).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_remove_omit_and_close() {
        let api = Arc::new(FakeClientsApi {
            existing: vec!["E8765432".into()],
            ..Default::default()
        });
        let exec = executor(api.clone());
        let session_id = exec.start_import(standard_file()).await.unwrap().session_id;

        let view = exec
            .update_cell(
                &session_id,
                3,
                UpdateCellRequest {
                    field: ClientField::Email,
                    value: "pedro@correo.com".into(),
                },
            )
            .await
            .unwrap();
        let row = view.rows.iter().find(|r| r.row.row_index == 3).unwrap();
        assert!(row.row.validation(ClientField::Email).unwrap().is_valid);

        let view = exec.remove_row(&session_id, 3).await.unwrap();
        assert_eq!(view.summary.pending, 3);

        let view = exec.omit_existing_cedulas(&session_id).await.unwrap();
        assert_eq!(view.summary.pending, 2);
        assert_eq!(view.summary.database_duplicates, 0);

        let toast_id = view.toasts[0].id.clone();
        exec.dismiss_toast(&session_id, &toast_id).await.unwrap();
        assert!(exec.dismiss_toast(&session_id, &toast_id).await.unwrap_err().is(NOT_FOUND));

        exec.save_individual_client(&session_id, 1).await.unwrap();
        let err = exec
            .update_cell(
                &session_id,
                1,
                UpdateCellRequest {
                    field: ClientField::Nombres,
                    value: "Otra Persona".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(err.is(CONFLICT));

        exec.close_session(&session_id).await.unwrap();
        assert!(exec.get_session(&session_id).await.unwrap_err().is(NOT_FOUND));
        assert!(exec.close_session(&session_id).await.is_err());
    }

    #[tokio::test]
    async fn test_start_import_csv() {
        let api = Arc::new(FakeClientsApi::default());
        let exec = executor(api.clone());
        let csv = "cedula;nombres;telefono;email;direccion;fecha_nacimiento;ocupacion;estado;activo;notas\n\
                   V12345678;ana diaz;4121234567;ana@correo.com;Av. Bolivar;1/1/1990;Comerciante;activo;TRUE;NN\n";

        let view = exec.start_import_csv("clientes.csv", csv.as_bytes()).await.unwrap();
        assert_eq!(view.summary.valid, 1);
        assert_eq!(view.rows[0].row.get(ClientField::FechaNacimiento), "01/01/1990");

        let outcome = exec.save_individual_client(&view.session_id, 1).await.unwrap();
        assert!(outcome.is_saved());
        let sent = &api.created()[0];
        assert_eq!(sent.fecha_nacimiento, "1990-01-01");
        assert_eq!(sent.estado, "ACTIVO");
        assert!(sent.activo);
        assert_eq!(sent.notas, None);
    }
}
