/// Метаданные UseCase: идентификация, логирование и префикс маршрутов
pub trait UseCaseMetadata {
    /// Индекс UseCase (например, "u501")
    fn usecase_index() -> &'static str;

    /// Техническое имя (например, "import_clientes")
    fn usecase_name() -> &'static str;

    /// Отображаемое имя для UI
    fn display_name() -> &'static str;

    fn description() -> &'static str {
        ""
    }

    /// "u501_import_clientes"
    fn full_name() -> String {
        format!("{}_{}", Self::usecase_index(), Self::usecase_name())
    }

    /// Корень HTTP маршрутов: "/api/u501/import"
    fn route_prefix() -> String {
        format!("/api/{}/import", Self::usecase_index())
    }
}
