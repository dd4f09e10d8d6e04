//! Columns of the client import sheet

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One column of the client import sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientField {
    Cedula,
    Nombres,
    Telefono,
    Email,
    Direccion,
    FechaNacimiento,
    Ocupacion,
    Estado,
    Activo,
    Notas,
}

impl ClientField {
    /// All columns in sheet order
    pub const ALL: [ClientField; 10] = [
        ClientField::Cedula,
        ClientField::Nombres,
        ClientField::Telefono,
        ClientField::Email,
        ClientField::Direccion,
        ClientField::FechaNacimiento,
        ClientField::Ocupacion,
        ClientField::Estado,
        ClientField::Activo,
        ClientField::Notas,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ClientField::Cedula => "cedula",
            ClientField::Nombres => "nombres",
            ClientField::Telefono => "telefono",
            ClientField::Email => "email",
            ClientField::Direccion => "direccion",
            ClientField::FechaNacimiento => "fecha_nacimiento",
            ClientField::Ocupacion => "ocupacion",
            ClientField::Estado => "estado",
            ClientField::Activo => "activo",
            ClientField::Notas => "notas",
        }
    }

    /// Label shown to the user
    pub const fn label(&self) -> &'static str {
        match self {
            ClientField::Cedula => "Cédula",
            ClientField::Nombres => "Nombres",
            ClientField::Telefono => "Teléfono",
            ClientField::Email => "Email",
            ClientField::Direccion => "Dirección",
            ClientField::FechaNacimiento => "Fecha de nacimiento",
            ClientField::Ocupacion => "Ocupación",
            ClientField::Estado => "Estado",
            ClientField::Activo => "Activo",
            ClientField::Notas => "Notas",
        }
    }
}

impl fmt::Display for ClientField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        ClientField::ALL
            .into_iter()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| format!("Unknown field: {}", s))
    }
}
