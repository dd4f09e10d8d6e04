use axum::{
    routing::{delete, get, post, put},
    Router,
};
use contracts::usecases::common::UseCaseMetadata;
use contracts::usecases::u501_import_clientes::ImportClientes;

use crate::api::handlers::usecases;

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    let u501 = ImportClientes::route_prefix();

    Router::new()
        .route("/health", get(|| async { "ok" }))
        // ========================================
        // USECASE u501: IMPORT CLIENTES
        // ========================================
        .route(&format!("{u501}/start"), post(usecases::u501_start_import))
        .route(&format!("{u501}/csv"), post(usecases::u501_start_import_csv))
        .route(
            &format!("{u501}/:session_id"),
            get(usecases::u501_get_session).delete(usecases::u501_close_session),
        )
        .route(
            &format!("{u501}/:session_id/rows/:row_index"),
            put(usecases::u501_update_cell).delete(usecases::u501_remove_row),
        )
        .route(
            &format!("{u501}/:session_id/rows/:row_index/save"),
            post(usecases::u501_save_row),
        )
        .route(
            &format!("{u501}/:session_id/save-all"),
            post(usecases::u501_save_all),
        )
        .route(
            &format!("{u501}/:session_id/confirm"),
            post(usecases::u501_confirm_duplicates),
        )
        .route(
            &format!("{u501}/:session_id/conflict/dismiss"),
            post(usecases::u501_dismiss_conflict),
        )
        .route(
            &format!("{u501}/:session_id/omit-existing"),
            post(usecases::u501_omit_existing),
        )
        .route(
            &format!("{u501}/:session_id/toasts/:toast_id"),
            delete(usecases::u501_dismiss_toast),
        )
}
