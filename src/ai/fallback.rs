use super::{token, GenerationParams, Tone};

/// Static, non-AI message source used when the upstream path is unusable.
///
/// Implementations must be pure: identical params give identical output.
pub trait FallbackProvider: Send + Sync {
    fn fallback(&self, params: &GenerationParams) -> String;
}

/// One keyword-triggered template family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRule {
    pub intent: String,
    pub keywords: Vec<String>,
    pub formal: String,
    pub informal: String,
}

impl IntentRule {
    pub fn new(
        intent: impl Into<String>,
        keywords: &[&str],
        formal: impl Into<String>,
        informal: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            formal: formal.into(),
            informal: informal.into(),
        }
    }

    /// A keyword matches the start of a word, so "sale" hits "sales" but not "wholesale".
    fn matches(&self, prompt: &str) -> bool {
        prompt
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.keywords.iter().any(|k| word.starts_with(k.as_str())))
    }

    fn template(&self, tone: Tone) -> &str {
        match tone {
            Tone::Formal => &self.formal,
            Tone::Informal => &self.informal,
        }
    }
}

/// Keyword classification over the prompt, first matching rule wins.
/// Templates carry `{name}`; other requested placeholders go in a trailing clause.
#[derive(Debug, Clone)]
pub struct TemplateFallback {
    rules: Vec<IntentRule>,
    generic: IntentRule,
}

impl Default for TemplateFallback {
    fn default() -> Self {
        Self {
            rules: vec![
                IntentRule::new(
                    "diwali",
                    &["diwali", "deepavali"],
                    "Dear {name}, warm Diwali greetings to you and your family. We wish you a bright and prosperous festive season.",
                    "Hello {name}, Diwali greetings! We wish you the best holiday. Namaste!",
                ),
                IntentRule::new(
                    "birthday",
                    &["birthday", "bday"],
                    "Dear {name}, many happy returns of the day. Wishing you a wonderful year ahead.",
                    "Hello {name}, happy birthday! Wishing you a wonderful year ahead.",
                ),
                IntentRule::new(
                    "promo",
                    &["promo", "discount", "offer", "sale"],
                    "Dear {name}, we are pleased to offer you an exclusive deal on your next order.",
                    "Hello {name}, enjoy an exclusive deal on your next order!",
                ),
                IntentRule::new(
                    "greeting",
                    &["greeting", "hello", "welcome", "wishes"],
                    "Dear {name}, warm greetings from all of us. Thank you for being with us.",
                    "Hi {name}, warm greetings from all of us! Great to have you with us.",
                ),
            ],
            generic: IntentRule::new(
                "generic",
                &[],
                "Dear {name}, we hope you are doing well. We have an update for you.",
                "Hello {name}, hope you are doing well. We have an update for you.",
            ),
        }
    }
}

impl TemplateFallback {
    /// Templates with no keyword rules, only the generic message
    pub fn with_generic(formal: impl Into<String>, informal: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            generic: IntentRule::new("generic", &[], formal, informal),
        }
    }

    /// Add a rule checked before the existing ones
    pub fn with_rule(mut self, rule: IntentRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    pub fn classify(&self, prompt: &str) -> &IntentRule {
        let prompt = prompt.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&prompt))
            .unwrap_or(&self.generic)
    }
}

impl FallbackProvider for TemplateFallback {
    fn fallback(&self, params: &GenerationParams) -> String {
        let rule = self.classify(&params.prompt);
        let mut message = rule.template(params.tone).to_string();

        // Placeholder matching downstream is case-insensitive, so is this check
        let lowered = message.to_lowercase();
        let extra: Vec<String> = params
            .placeholder_names()
            .into_iter()
            .filter(|name| !lowered.contains(&token(&name.to_lowercase())))
            .map(|name| token(&name))
            .collect();

        if !extra.is_empty() {
            let label = match params.tone {
                Tone::Formal => "Your details",
                Tone::Informal => "Here's what's in it for you",
            };
            message.push_str(&format!(" {}: {}.", label, extra.join(", ")));
        }

        log::debug!("Fallback template '{}' selected", rule.intent);
        message
    }
}
