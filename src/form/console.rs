use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{FormError, FormHandler, FormResult};

type SharedInput = Arc<Mutex<Box<dyn BufRead + Send>>>;

/// Asks the operator for field values on the terminal.
///
/// Prompts go to stderr so that stdout stays usable for scripting. Closing the
/// input (Ctrl-D) aborts the form; an empty answer means the value is unavailable.
#[derive(Clone)]
pub struct ConsoleForm {
    input: SharedInput,
}

impl ConsoleForm {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Arc::new(Mutex::new(Box::new(reader))),
        }
    }
}

#[async_trait]
impl FormHandler for ConsoleForm {
    async fn supply(&self, field_id: &str, prompt: Option<&str>) -> FormResult<String> {
        let input = Arc::clone(&self.input);
        let label = prompt.unwrap_or(field_id).to_string();

        let line = tokio::task::spawn_blocking(move || read_answer(&input, &label))
            .await
            .map_err(|e| FormError::Failed(format!("input task failed: {e}")))??;

        match line {
            Some(value) if !value.is_empty() => Ok(value),
            Some(_) => Err(FormError::Unavailable(field_id.to_string())),
            None => Err(FormError::Cancelled("input closed".into())),
        }
    }
}

fn read_answer(input: &SharedInput, label: &str) -> FormResult<Option<String>> {
    let mut stderr = io::stderr().lock();
    let _ = write!(stderr, "{label}: ");
    let _ = stderr.flush();

    let mut input = input
        .lock()
        .map_err(|_| FormError::Failed("input lock poisoned".into()))?;
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| FormError::Failed(e.to_string()))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
