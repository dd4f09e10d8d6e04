use serde::{Deserialize, Serialize};

// ============================================================================
// Create payload
// ============================================================================

/// Тело запроса создания клиента (POST /api/v1/clientes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClienteCreate {
    #[serde(default)]
    pub cedula: String,
    pub nombres: String,
    pub telefono: String,
    pub email: String,
    pub direccion: String,
    /// YYYY-MM-DD
    pub fecha_nacimiento: String,
    pub ocupacion: String,
    pub estado: String,
    pub activo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notas: Option<String>,

    /// Пользователь подтвердил создание несмотря на дубликат в базе
    #[serde(default)]
    pub confirmar_duplicado: bool,
    /// Обоснование подтверждения (для аудита)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comentario: Option<String>,
}

/// Ответ сервера при успешном создании
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClienteCreado {
    pub id: i64,
    #[serde(default)]
    pub cedula: String,
    #[serde(default)]
    pub nombres: String,
}

// ============================================================================
// Conflict (HTTP 409)
// ============================================================================

/// Клиент, уже существующий в базе
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClienteExistente {
    pub id: i64,
    pub nombres: String,
    pub cedula: String,
    #[serde(default)]
    pub telefono: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub fecha_registro: Option<String>,
}

/// Краткая информация о кредите существующего клиента
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrestamoResumen {
    pub id: i64,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub total_financiamiento: Option<f64>,
    #[serde(default)]
    pub fecha_registro: Option<String>,
}

/// Тело ответа 409 при обнаружении дубликата
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictoDuplicado {
    pub cliente_existente: ClienteExistente,
    #[serde(default)]
    pub prestamos: Vec<PrestamoResumen>,
}
