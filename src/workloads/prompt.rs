//! Operator prompt for a replacement workload name.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// Inputs for one name prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePromptRequest {
    /// Value the input starts with.
    pub initial_value: String,
    /// Name the runtime refused last; the validator rejects it.
    pub rejected_name: Option<String>,
    /// Show the validation result before the operator edits anything.
    pub validate_on_mount: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameValidationError {
    #[error("Name is required")]
    Empty,
    #[error("This name is already taken. Please choose another name.")]
    Taken,
}

impl NamePromptRequest {
    /// Validate an entered name, returning it trimmed.
    pub fn validate(&self, name: &str) -> Result<String, NameValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NameValidationError::Empty);
        }
        if self.rejected_name.as_deref() == Some(name) {
            return Err(NameValidationError::Taken);
        }
        Ok(name.to_string())
    }
}

/// Asks the operator for a workload name.
#[async_trait]
pub trait NamePrompt: Send + Sync {
    /// `Ok(None)` means the operator cancelled.
    async fn ask_name(&self, request: &NamePromptRequest) -> io::Result<Option<String>>;
}

/// Line-based prompt over any reader and writer, typically stdin and stderr.
///
/// An empty line or end of input cancels. Reads run on tokio's blocking
/// pool.
pub struct LinePrompt<R, W> {
    io: Arc<Mutex<(R, W)>>,
}

impl<R, W> LinePrompt<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            io: Arc::new(Mutex::new((input, output))),
        }
    }

    /// The reader and writer back, once no read is in flight.
    pub fn into_inner(self) -> Option<(R, W)> {
        Arc::try_unwrap(self.io).ok().map(Mutex::into_inner)
    }
}

fn ask_blocking<R: BufRead, W: Write>(
    io: &Mutex<(R, W)>,
    request: &NamePromptRequest,
) -> io::Result<Option<String>> {
    let mut guard = io.lock();
    let (input, output) = &mut *guard;

    if request.validate_on_mount {
        if let Err(reason) = request.validate(&request.initial_value) {
            writeln!(output, "{reason}")?;
        }
    }
    if !request.initial_value.is_empty() {
        writeln!(output, "Last tried: {}", request.initial_value)?;
    }
    write!(output, "New name (empty to cancel): ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(line.to_string()))
}

#[async_trait]
impl<R, W> NamePrompt for LinePrompt<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    async fn ask_name(&self, request: &NamePromptRequest) -> io::Result<Option<String>> {
        let io = Arc::clone(&self.io);
        let request = request.clone();
        tokio::task::spawn_blocking(move || ask_blocking(&io, &request))
            .await
            .map_err(io::Error::other)?
    }
}
