use resetline_core::config::RouterConfig;

pub const EMPTY_INPUT_MESSAGE: &str =
    "I'm sorry, I didn't catch that. Could you please repeat your request?";
pub const OUT_OF_DOMAIN_MESSAGE: &str =
    "I'm sorry, I didn't understand that. I can help you reset your password if needed.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateVerdict {
    Pass { matched_keyword: String },
    Empty,
    OutOfDomain,
}

impl GateVerdict {
    /// Refusal text for a blocked utterance, `None` when the gate passed.
    pub fn refusal_message(&self) -> Option<&'static str> {
        match self {
            Self::Pass { .. } => None,
            Self::Empty => Some(EMPTY_INPUT_MESSAGE),
            Self::OutOfDomain => Some(OUT_OF_DOMAIN_MESSAGE),
        }
    }
}

/// Cheap local filter deciding which utterances may reach the model.
#[derive(Clone, Debug)]
pub struct IntentGate {
    keywords: Vec<String>,
    clarification_markers: Vec<String>,
}

impl Default for IntentGate {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

impl IntentGate {
    pub fn new(keywords: Vec<String>, clarification_markers: Vec<String>) -> Self {
        Self {
            keywords: normalize_terms(keywords),
            clarification_markers: normalize_terms(clarification_markers),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.keywords.clone(), config.clarification_markers.clone())
    }

    pub fn evaluate(&self, utterance: &str) -> GateVerdict {
        if utterance.trim().is_empty() {
            return GateVerdict::Empty;
        }

        match first_match(&self.keywords, utterance) {
            Some(keyword) => GateVerdict::Pass { matched_keyword: keyword.to_string() },
            None => GateVerdict::OutOfDomain,
        }
    }

    /// True when free model text is still about the account and so reads as a
    /// clarifying question rather than an unrelated reply.
    pub fn is_clarification(&self, model_text: &str) -> bool {
        first_match(&self.clarification_markers, model_text).is_some()
    }
}

fn normalize_terms(terms: Vec<String>) -> Vec<String> {
    terms.iter().map(|term| normalize_text(term)).filter(|term| !term.is_empty()).collect()
}

/// Lowercases and folds typographic apostrophes, which speech-to-text output
/// often contains ("can’t log in").
fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

fn first_match<'a>(terms: &'a [String], text: &str) -> Option<&'a str> {
    let normalized = normalize_text(text);
    terms.iter().find(|term| normalized.contains(term.as_str())).map(String::as_str)
}
