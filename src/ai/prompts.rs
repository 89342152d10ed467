use super::config::*;
use super::{token, ChatMessage, GenerationConfig, GenerationParams, MessageLength, Tone};

/// The two messages sent upstream for one generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system_message: String,
    pub user_message: String,
}

impl PromptPayload {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_message),
            ChatMessage::user(self.user_message),
        ]
    }
}

fn tone_guidance(tone: Tone) -> &'static str {
    match tone {
        Tone::Informal => "Use a warm, friendly, conversational tone.",
        Tone::Formal => "Use a polite, professional and respectful tone.",
    }
}

fn sentence_rule(length: MessageLength) -> &'static str {
    match length {
        MessageLength::Short => "Write 1 to 2 concise sentences.",
        MessageLength::Medium => "Write 4 to 5 complete sentences.",
        MessageLength::Long => "Write 7 to 9 complete sentences.",
    }
}

/// Token budget for the requested length, never above the configured ceiling
pub fn token_budget(length: MessageLength, max_tokens: u32) -> u32 {
    let budget = match length {
        MessageLength::Short => SHORT_TOKEN_BUDGET,
        MessageLength::Medium => MEDIUM_TOKEN_BUDGET,
        MessageLength::Long => LONG_TOKEN_BUDGET,
    };
    budget.min(max_tokens)
}

pub fn build_prompt(params: &GenerationParams, config: &GenerationConfig) -> PromptPayload {
    let placeholder_rules: Vec<String> = params
        .placeholder_names()
        .iter()
        .map(|name| {
            format!(
                " - Include the exact placeholder {} exactly once.",
                token(name)
            )
        })
        .collect();

    let mut user_message = format!(
        "Tone: {}\nUser prompt: {}\n\n\
         Task: Produce one broadcast-ready message based on the user prompt.\n\
         Output rules:\n - {}\n - {}\n{}\n\
         \x20- Keep it brand-safe.\n\
         \x20- Do not include links or phone numbers.\n\
         \x20- Do not ask questions.\n\
         \x20- Return plain text only: no markdown, no explanation, no surrounding quotes.",
        params.tone,
        params.prompt.trim(),
        tone_guidance(params.tone),
        sentence_rule(params.length),
        placeholder_rules.join("\n"),
    );

    if let Some(audience) = params.audience() {
        user_message.push_str(&format!("\n\nTarget audience: {}", audience));
    }

    PromptPayload {
        system_message: config.system_prompt.clone(),
        user_message,
    }
}

/// Single user message sent after a blank completion. Drops the system prompt and
/// the long rule list, keeping tone, length and the placeholder instruction.
pub fn build_simplified_message(params: &GenerationParams) -> String {
    let tokens: Vec<String> = params.placeholder_names().iter().map(|n| token(n)).collect();

    format!(
        "Audience: {}. Tone: {}. {} Include each of these placeholders exactly once: {}. \
         No links or questions.\nPrompt: {}",
        params.audience().unwrap_or("general audience"),
        params.tone,
        sentence_rule(params.length),
        tokens.join(", "),
        params.prompt.trim(),
    )
}
