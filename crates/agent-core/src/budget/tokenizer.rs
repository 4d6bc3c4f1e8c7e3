//! Token counting for budget management.
//!
//! Counting is heuristic: each encoding profile is a bytes-per-token ratio
//! with a 10% safety margin. Non-ASCII text is multi-byte in UTF-8 and so
//! costs more per character, which tracks real BPE vocabularies reasonably
//! well. Exact fidelity is not a goal; the clipper tolerates small errors.

use std::sync::Arc;

use crate::agent::types::Message;

/// Marker appended to truncated content.
pub const ELLIPSIS: &str = "…";

/// Rough per-message cost of role and framing metadata.
pub const MESSAGE_OVERHEAD_TOKENS: u32 = 4;

/// Encoding families a model can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    O200kBase,
    Cl100kBase,
    DeepSeek,
    Claude,
}

impl Encoding {
    pub const DEFAULT: Encoding = Encoding::Cl100kBase;

    /// Resolve a model identifier. Unknown models use [`Encoding::DEFAULT`].
    pub fn for_model(model: &str) -> Encoding {
        let model = model.trim().to_ascii_lowercase();
        let model = model.rsplit('/').next().unwrap_or(&model);
        const PREFIXES: &[(&str, Encoding)] = &[
            ("gpt-4o", Encoding::O200kBase),
            ("gpt-4.1", Encoding::O200kBase),
            ("o1", Encoding::O200kBase),
            ("o3", Encoding::O200kBase),
            ("o4", Encoding::O200kBase),
            ("gpt-4", Encoding::Cl100kBase),
            ("gpt-3.5", Encoding::Cl100kBase),
            ("text-embedding-3", Encoding::Cl100kBase),
            ("deepseek", Encoding::DeepSeek),
            ("claude", Encoding::Claude),
        ];
        PREFIXES
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, encoding)| *encoding)
            .unwrap_or(Encoding::DEFAULT)
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::O200kBase => "o200k_base",
            Encoding::Cl100kBase => "cl100k_base",
            Encoding::DeepSeek => "deepseek",
            Encoding::Claude => "claude",
        }
    }

    fn bytes_per_token(self) -> f64 {
        match self {
            Encoding::O200kBase => 4.4,
            Encoding::Cl100kBase => 4.0,
            Encoding::DeepSeek => 3.6,
            Encoding::Claude => 3.5,
        }
    }
}

/// Pluggable tokenizer used by the context budgeter.
pub trait Tokenizer: Send + Sync {
    /// Approximate token count of `text` for `model`. Never zero for non-empty text.
    fn count(&self, model: &str, text: &str) -> u32;

    /// Cut `text` so that it costs at most `max_tokens`, marker included.
    /// Returns `text` unchanged when it already fits.
    fn truncate(&self, model: &str, text: &str, max_tokens: u32) -> String;

    /// Cost of one message: content plus [`MESSAGE_OVERHEAD_TOKENS`].
    fn count_message(&self, model: &str, message: &Message) -> u32 {
        self.count(model, &message.content)
            .saturating_add(MESSAGE_OVERHEAD_TOKENS)
    }

    fn count_messages(&self, model: &str, messages: &[Message]) -> u32 {
        messages
            .iter()
            .fold(0u32, |acc, m| acc.saturating_add(self.count_message(model, m)))
    }
}

/// Arc-wrapped tokenizer for easy sharing.
pub type SharedTokenizer = Arc<dyn Tokenizer>;

/// Heuristic tokenizer: `ceil(utf8_bytes / bytes_per_token * safety_margin)`.
#[derive(Debug, Clone)]
pub struct HeuristicTokenizer {
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
}

impl HeuristicTokenizer {
    pub fn new(safety_margin: f64) -> Self {
        Self {
            safety_margin: safety_margin.max(1.0),
        }
    }

    fn tokens_for_bytes(&self, encoding: Encoding, bytes: usize) -> u32 {
        if bytes == 0 {
            return 0;
        }
        let tokens = bytes as f64 / encoding.bytes_per_token() * self.safety_margin;
        (tokens.ceil() as u32).max(1)
    }

    /// Largest byte length whose estimate stays within `max_tokens`.
    fn bytes_for_tokens(&self, encoding: Encoding, max_tokens: u32) -> usize {
        let mut bytes =
            (max_tokens as f64 * encoding.bytes_per_token() / self.safety_margin).floor() as usize;
        // Float rounding can land one byte over.
        while bytes > 0 && self.tokens_for_bytes(encoding, bytes) > max_tokens {
            bytes -= 1;
        }
        bytes
    }
}

impl Default for HeuristicTokenizer {
    fn default() -> Self {
        Self::new(1.1)
    }
}

impl Tokenizer for HeuristicTokenizer {
    fn count(&self, model: &str, text: &str) -> u32 {
        self.tokens_for_bytes(Encoding::for_model(model), text.len())
    }

    fn truncate(&self, model: &str, text: &str, max_tokens: u32) -> String {
        if max_tokens == 0 || text.is_empty() {
            return String::new();
        }
        if self.count(model, text) <= max_tokens {
            return text.to_string();
        }

        let encoding = Encoding::for_model(model);
        let marker_tokens = self.tokens_for_bytes(encoding, ELLIPSIS.len());
        let room = max_tokens.saturating_sub(marker_tokens);
        let cut = self.bytes_for_tokens(encoding, room).min(text.len());

        let mut prefix = if text.is_char_boundary(cut) {
            &text[..cut]
        } else {
            // The byte budget landed inside a multi-byte character.
            rough_cut_chars(text, cut)
        };

        let mut truncated = format!("{prefix}{ELLIPSIS}");
        while !prefix.is_empty() && self.count(model, &truncated) > max_tokens {
            let last = prefix.chars().next_back().map(char::len_utf8).unwrap_or(0);
            prefix = &prefix[..prefix.len() - last];
            truncated = format!("{prefix}{ELLIPSIS}");
        }
        truncated
    }
}

/// Character-level fallback: the longest prefix of whole characters that
/// fits in `max_bytes`.
fn rough_cut_chars(text: &str, max_bytes: usize) -> &str {
    let end = text
        .char_indices()
        .map(|(idx, ch)| idx + ch.len_utf8())
        .take_while(|end| *end <= max_bytes)
        .last()
        .unwrap_or(0);
    &text[..end]
}
