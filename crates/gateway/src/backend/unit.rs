//! Editing of the model server's systemd unit file.
//!
//! Only the `ExecStart=` line and one `Environment=` line are touched; the
//! rest of the file is preserved byte for byte.

use std::path::Path;

use regex::Regex;

use hearth_domain::backend::AugmentMode;
use hearth_domain::error::{Error, Result};

const RAG_FLAG: &str = "--rag";
const MODE_ENV: &str = "HEARTH_RAG_MODE";

/// Changes to apply to a unit file.
#[derive(Debug, Clone, Copy)]
pub struct UnitChange<'a> {
    /// New model, as requested by the user (normalised before writing).
    pub model: Option<&'a str>,
    /// Retrieval database to serve, or `None` to disable augmentation.
    pub rag: Option<&'a Path>,
    pub mode: AugmentMode,
}

pub struct UnitRewriter {
    model_token: Regex,
}

impl UnitRewriter {
    pub fn new() -> Result<Self> {
        // A transport-prefixed reference or a bare `name:latest`.
        let model_token = Regex::new(r"^(?:[a-z][a-z0-9+.-]*://\S+|[A-Za-z0-9._/-]+:latest)$")
            .map_err(|e| Error::Config(format!("model token pattern: {e}")))?;
        Ok(Self { model_token })
    }

    /// Apply `change` to the unit `content`.
    pub fn rewrite(&self, content: &str, change: &UnitChange<'_>) -> Result<String> {
        let mut lines: Vec<String> = content.lines().map(str::to_owned).collect();
        let exec_idx = lines
            .iter()
            .position(|l| l.trim_start().starts_with("ExecStart="))
            .ok_or_else(|| Error::Backend("unit file has no ExecStart line".into()))?;

        lines[exec_idx] = self.rewrite_exec_start(&lines[exec_idx], change)?;

        let env_line = format!("Environment={MODE_ENV}={}", change.mode);
        let env_prefix = format!("Environment={MODE_ENV}=");
        match lines
            .iter()
            .position(|l| l.trim_start().starts_with(&env_prefix))
        {
            Some(idx) => lines[idx] = env_line,
            None => lines.insert(exec_idx + 1, env_line),
        }

        let mut out = lines.join("\n");
        if content.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }

    fn rewrite_exec_start(&self, line: &str, change: &UnitChange<'_>) -> Result<String> {
        let body = line
            .trim_start()
            .strip_prefix("ExecStart=")
            .unwrap_or(line);
        let mut tokens = strip_rag_args(body.split_whitespace().map(str::to_owned).collect());

        if let Some(model) = change.model {
            let idx = tokens
                .iter()
                .rposition(|t| self.model_token.is_match(t))
                .ok_or_else(|| Error::Backend("no model argument found in ExecStart".into()))?;
            tokens[idx] = normalize_model_spec(model);
        }

        if let Some(rag) = change.rag {
            let serve = tokens
                .iter()
                .position(|t| t == "serve")
                .ok_or_else(|| Error::Backend("ExecStart does not run `serve`".into()))?;
            tokens.insert(serve + 1, RAG_FLAG.to_owned());
            tokens.insert(serve + 2, quote_if_needed(&rag.display().to_string()));
        }

        Ok(format!("ExecStart={}", tokens.join(" ")))
    }
}

/// Whether the unit's `ExecStart` currently serves a retrieval database.
pub fn exec_start_has_rag(content: &str) -> bool {
    content
        .lines()
        .filter_map(|l| l.trim_start().strip_prefix("ExecStart="))
        .flat_map(str::split_whitespace)
        .any(|t| t == RAG_FLAG || t.starts_with("--rag="))
}

/// Expand a model name into the reference form the model server expects.
///
/// `llama3.2` becomes `ollama://library/llama3.2:latest`,
/// `library/qwq` becomes `ollama://library/qwq:latest`; references that
/// already carry a transport are kept as they are.
pub fn normalize_model_spec(model: &str) -> String {
    let model = model.trim();
    if model.contains("://") {
        return model.to_owned();
    }
    let path = if model.contains('/') {
        model.to_owned()
    } else {
        format!("library/{model}")
    };
    if path.contains(':') {
        format!("ollama://{path}")
    } else {
        format!("ollama://{path}:latest")
    }
}

fn strip_rag_args(tokens: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut skip_value = false;
    for token in tokens {
        if skip_value {
            skip_value = false;
            continue;
        }
        if token == RAG_FLAG {
            skip_value = true;
            continue;
        }
        if token.starts_with("--rag=") {
            continue;
        }
        out.push(token);
    }
    out
}

fn quote_if_needed(s: &str) -> String {
    if s.chars().any(char::is_whitespace) {
        format!("\"{s}\"")
    } else {
        s.to_owned()
    }
}
