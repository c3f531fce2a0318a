//! error.rs — runtime errors, formatted with a call-stack trace the
//! way the original host's `runtime_error` prints one: innermost
//! frame first, `[line N] in <fn name>`, the top-level script spelled
//! `script` (spec §5, §8 "uncaught runtime error").

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", self.render())]
pub struct RuntimeError {
    pub message: String,
    /// Pre-formatted `[line N] in <fn>` entries, innermost frame first.
    pub trace: Vec<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), trace: Vec::new() }
    }

    pub fn with_trace(message: impl Into<String>, trace: Vec<String>) -> Self {
        Self { message: message.into(), trace }
    }

    fn render(&self) -> String {
        let mut out = self.message.clone();
        for line in &self.trace {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}
