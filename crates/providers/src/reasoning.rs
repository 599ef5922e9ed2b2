//! Model-name heuristics shared by request building and prompt assembly.

/// Model families that return separate reasoning output.
const REASONING_FAMILIES: &[&str] = &[
    "deepseek-r1",
    "deepseek-reasoner",
    "qwen-qwq",
    "qwq",
    "o1",
    "o3",
];

pub const REASONING_TEMPERATURE: f32 = 0.6;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Whether `model` belongs to a known reasoning-capable family.
///
/// Matches on the display name's path segments and dash-separated tokens so
/// that `o1` does not match e.g. `llama-3.1-70b-o1x`.
pub fn supports_reasoning(model: &str) -> bool {
    let name = display_name(model).to_ascii_lowercase();
    REASONING_FAMILIES.iter().any(|family| {
        name == *family
            || name.starts_with(&format!("{family}-"))
            || name.starts_with(&format!("{family}:"))
            || name.contains(&format!("-{family}-"))
            || name.ends_with(&format!("-{family}"))
            || (family.contains('-') && name.contains(family))
    })
}

/// Temperature and reasoning flag for a request to `model`.
pub fn sampling_for(model: &str, reasoning_enabled: bool) -> (f32, bool) {
    if reasoning_enabled && supports_reasoning(model) {
        (REASONING_TEMPERATURE, true)
    } else {
        (DEFAULT_TEMPERATURE, false)
    }
}

/// Human-facing model name: scheme and path dropped, `:latest` stripped.
///
/// `ollama://library/llama3.2:latest` becomes `llama3.2`.
pub fn display_name(model: &str) -> &str {
    let without_scheme = model.split_once("://").map_or(model, |(_, rest)| rest);
    let last = without_scheme
        .rsplit('/')
        .next()
        .unwrap_or(without_scheme);
    last.strip_suffix(":latest").unwrap_or(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_strips_path_and_latest() {
        assert_eq!(display_name("ollama://library/llama3.2:latest"), "llama3.2");
        assert_eq!(display_name("library/qwen2.5:7b"), "qwen2.5:7b");
        assert_eq!(display_name("mistral"), "mistral");
        assert_eq!(display_name("hf://org/repo/model.gguf"), "model.gguf");
    }

    #[test]
    fn known_reasoning_families_match() {
        assert!(supports_reasoning("deepseek-r1:14b"));
        assert!(supports_reasoning("ollama://library/deepseek-r1:latest"));
        assert!(supports_reasoning("qwq"));
        assert!(supports_reasoning("QwQ-32B"));
        assert!(supports_reasoning("qwen-qwq-32b-preview"));
        assert!(supports_reasoning("o3-mini"));
    }

    #[test]
    fn ordinary_models_do_not_match() {
        assert!(!supports_reasoning("llama3.2"));
        assert!(!supports_reasoning("mistral-7b"));
        assert!(!supports_reasoning("phi3o1x"));
    }

    #[test]
    fn sampling_depends_on_flag_and_family() {
        assert_eq!(sampling_for("deepseek-r1", true), (0.6, true));
        assert_eq!(sampling_for("deepseek-r1", false), (0.7, false));
        assert_eq!(sampling_for("llama3.2", true), (0.7, false));
    }
}
