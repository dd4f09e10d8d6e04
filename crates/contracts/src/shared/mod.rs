pub mod notice;
pub mod validation;
