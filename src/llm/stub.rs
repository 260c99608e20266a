use super::{LlmClient, LlmError};

const ECHO_LINES: usize = 48;

/// Offline completion: echoes the first non-blank prompt lines. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubLlm;

impl LlmClient for StubLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let lines: Vec<&str> = prompt
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(ECHO_LINES)
            .collect();
        Ok(format!("{}\n\n(Stub summary)", lines.join("\n")))
    }
}
