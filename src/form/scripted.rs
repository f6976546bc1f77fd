use std::collections::HashMap;

use async_trait::async_trait;

use super::{FormError, FormHandler, FormResult};

#[derive(Debug, thiserror::Error)]
#[error("Wrong format for fields pair: {0}. Required: fieldId=fieldValue,")]
pub struct FieldsFormatError(String);

/// Answers field requests from a fixed mapping.
///
/// Fields missing from the mapping are passed to the fallback handler when one
/// is configured and reported as unavailable otherwise.
#[derive(Default)]
pub struct ScriptedForm {
    fields: HashMap<String, String>,
    fallback: Option<Box<dyn FormHandler>>,
}

impl ScriptedForm {
    pub fn new(fields: HashMap<String, String>) -> Self {
        Self {
            fields,
            fallback: None,
        }
    }

    /// Parses `fieldId=value,fieldId=value`. Empty pairs are skipped.
    pub fn parse(pairs: &str) -> Result<Self, FieldsFormatError> {
        let mut fields = HashMap::new();
        for pair in pairs.split(',').filter(|p| !p.is_empty()) {
            match pair.split('=').collect::<Vec<_>>().as_slice() {
                [field, value] => {
                    fields.insert(field.to_string(), value.to_string());
                }
                _ => return Err(FieldsFormatError(pair.to_string())),
            }
        }
        Ok(Self::new(fields))
    }

    pub fn with_fallback(mut self, fallback: impl FormHandler + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[async_trait]
impl FormHandler for ScriptedForm {
    async fn supply(&self, field_id: &str, prompt: Option<&str>) -> FormResult<String> {
        if let Some(value) = self.fields.get(field_id) {
            tracing::debug!("Using pre-supplied value for field {field_id}");
            return Ok(value.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.supply(field_id, prompt).await,
            None => Err(FormError::Unavailable(field_id.to_string())),
        }
    }
}
