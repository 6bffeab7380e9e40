//! CLI-backed oracle client
//!
//! Shells out to a configured vision CLI (e.g. a gemini/claude wrapper).
//! Convention: the command receives the image path as `--image <path>`, the
//! prompt on stdin, and prints its response on stdout. Timeouts are applied
//! by the fan-out layer, not here.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use trapscan_types::OracleError;

use crate::parse::parse_observation;
use crate::prompts::build_count_prompt;
use crate::{OracleClient, OracleObservation, OracleRequest};

/// Oracle client backed by an external CLI tool
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    /// Build from a configured command line, e.g. `"gemini-vision --json"`
    pub fn new(command_line: &str, model: Option<&str>) -> Result<Self, OracleError> {
        let mut parts = shell_words::split(command_line)
            .map_err(|e| OracleError::Unavailable(format!("bad oracle command: {e}")))?;
        if parts.is_empty() {
            return Err(OracleError::Unavailable(
                "empty oracle command".to_string(),
            ));
        }
        let program = parts.remove(0);
        if let Some(model) = model {
            parts.push("--model".to_string());
            parts.push(model.to_string());
        }
        Ok(Self {
            program,
            args: parts,
        })
    }
}

#[async_trait]
impl OracleClient for CommandOracle {
    async fn count(&self, request: &OracleRequest) -> Result<OracleObservation, OracleError> {
        let prompt = build_count_prompt(request.category, request.expected_hint);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--image")
            .arg(&request.image_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Unavailable(format!("{}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OracleError::Unavailable(format!("writing prompt: {e}")))?;
            // Close stdin so the tool sees EOF
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OracleError::Unavailable(format!("waiting for oracle: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OracleError::Unavailable(format!(
                "oracle exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_observation(&stdout)
    }
}
