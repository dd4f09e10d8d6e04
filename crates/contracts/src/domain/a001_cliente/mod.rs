pub mod aggregate;

pub use aggregate::{ClienteCreado, ClienteCreate, ClienteExistente, ConflictoDuplicado, PrestamoResumen};
