//! Answers to field requests raised by the orchestrator in the middle of a
//! delivery (a PIN, a confirmation code, an e-mail address, ...).

mod console;
mod scripted;

pub use console::ConsoleForm;
pub use scripted::{FieldsFormatError, ScriptedForm};

use async_trait::async_trait;

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// No value can be produced for the field.
    #[error("No value available for field {0}")]
    Unavailable(String),

    /// The user aborted the input.
    #[error("Input cancelled: {0}")]
    Cancelled(String),

    #[error("Form handler failed: {0}")]
    Failed(String),
}

/// Supplies the value of a named field.
#[async_trait]
pub trait FormHandler: Send + Sync {
    async fn supply(&self, field_id: &str, prompt: Option<&str>) -> FormResult<String>;
}

#[async_trait]
impl<F: FormHandler + ?Sized> FormHandler for Box<F> {
    async fn supply(&self, field_id: &str, prompt: Option<&str>) -> FormResult<String> {
        (**self).supply(field_id, prompt).await
    }
}
