//! Prompt assembly for one generation.

use hearth_domain::config::GenerationConfig;
use hearth_domain::message::{Message, Turn};
use hearth_providers::reasoning::{display_name, sampling_for, supports_reasoning};
use hearth_providers::ChatRequest;

/// Render the system prompt template for `model`.
pub fn system_prompt(template: &str, model: &str) -> String {
    template.replace("{model_name}", display_name(model))
}

/// Whether to ask `model` for reasoning output. An explicit setting wins;
/// otherwise reasoning follows the model family.
pub fn reasoning_enabled(setting: Option<bool>, model: &str) -> bool {
    setting.unwrap_or_else(|| supports_reasoning(model))
}

/// Build the backend request: system prompt, the newest `context_turns`
/// turns of `context`, then the user message.
pub fn build_request(
    cfg: &GenerationConfig,
    model: &str,
    reasoning: bool,
    context: &[Turn],
    user_message: &str,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(2 + context.len() * 2);
    messages.push(Message::system(system_prompt(&cfg.system_prompt, model)));

    let start = context.len().saturating_sub(cfg.context_turns);
    for turn in &context[start..] {
        messages.push(Message::user(turn.user.as_str()));
        messages.push(Message::assistant(turn.assistant.as_str()));
    }
    messages.push(Message::user(user_message));

    let (temperature, reasoning) = sampling_for(model, reasoning);
    ChatRequest {
        model: model.to_owned(),
        messages,
        temperature: Some(temperature),
        reasoning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_domain::message::Role;

    fn turns(n: usize) -> Vec<Turn> {
        (0..n).map(|i| Turn::new(format!("q{i}"), format!("a{i}"))).collect()
    }

    #[test]
    fn system_prompt_uses_display_name() {
        let p = system_prompt("Powered by {model_name}.", "ollama://library/qwq:latest");
        assert_eq!(p, "Powered by qwq.");
    }

    #[test]
    fn request_keeps_only_newest_context_turns() {
        let cfg = GenerationConfig::default();
        let req = build_request(&cfg, "llama3.2", false, &turns(8), "hello");

        // system + 5 turns * 2 + user
        assert_eq!(req.messages.len(), 12);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[1].content, "q3");
        assert_eq!(req.messages[10].content, "a7");
        assert_eq!(req.messages[11].content, "hello");
        assert_eq!(req.temperature, Some(0.7));
        assert!(!req.reasoning);
    }

    #[test]
    fn reasoning_models_get_lower_temperature_and_flag() {
        let cfg = GenerationConfig::default();
        let req = build_request(&cfg, "deepseek-r1:14b", true, &[], "2+2?");
        assert_eq!(req.temperature, Some(0.6));
        assert!(req.reasoning);
        assert_eq!(req.messages.len(), 2);
    }

    #[test]
    fn reasoning_setting_defaults_to_model_family() {
        assert!(reasoning_enabled(None, "qwq"));
        assert!(!reasoning_enabled(None, "llama3.2"));
        assert!(!reasoning_enabled(Some(false), "qwq"));
    }
}
