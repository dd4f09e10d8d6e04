//! Common types and traits for all UseCases

pub mod usecase_metadata;
pub mod usecase_result;

pub use usecase_metadata::UseCaseMetadata;
pub use usecase_result::{
    UseCaseError, UseCaseResult, CONFLICT, EXTERNAL_ERROR, INTERNAL_ERROR, NOT_FOUND, VALIDATION_ERROR,
};
