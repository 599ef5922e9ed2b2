use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// System prompt template. `{model_name}` is replaced with the display
    /// name of the configured model.
    #[serde(default = "d_system_prompt")]
    pub system_prompt: String,
    /// Number of recent turns fetched from the conversation store.
    #[serde(default = "d_context_limit")]
    pub context_limit: usize,
    /// Number of those turns actually sent to the backend.
    #[serde(default = "d_context_turns")]
    pub context_turns: usize,
    /// Whether a superseded generation's answer is still persisted.
    #[serde(default)]
    pub superseded_policy: SupersededPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: d_system_prompt(),
            context_limit: d_context_limit(),
            context_turns: d_context_turns(),
            superseded_policy: SupersededPolicy::default(),
        }
    }
}

/// What happens to the answer of a generation that a newer one replaced
/// before it finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupersededPolicy {
    /// Drop it; only the current generation reaches the store.
    #[default]
    Discard,
    /// Persist whatever the superseded generation accumulated.
    Persist,
}

fn d_system_prompt() -> String {
    "You are Hearth, an AI assistant running locally on this desktop.\n\
     You are powered by {model_name}, served from this machine.\n\n\
     Be helpful, concise and friendly. If you don't know something, say so.\n\
     Be honest about your capabilities and limitations as a locally running model."
        .into()
}
fn d_context_limit() -> usize {
    10
}
fn d_context_turns() -> usize {
    5
}
