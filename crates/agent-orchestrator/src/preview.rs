use std::time::{Duration, Instant};

/// Characters that end a sentence for preview purposes.
pub const SENTENCE_TERMINATORS: &[char] = &['。', '.', '!', '?', '！', '？'];

/// Decides when a run emits its single preview frame.
///
/// Text is buffered until it contains a sentence terminator (the preview is
/// the text up to and including it) or until a delta arrives after `delay`
/// has passed since the run started (the preview is everything buffered).
#[derive(Debug)]
pub struct PreviewGate {
    buffer: String,
    started: Instant,
    delay: Duration,
    emitted: bool,
}

impl PreviewGate {
    pub fn new(delay: Duration) -> Self {
        Self::starting_at(Instant::now(), delay)
    }

    pub fn starting_at(started: Instant, delay: Duration) -> Self {
        Self {
            buffer: String::new(),
            started,
            delay,
            emitted: false,
        }
    }

    pub fn emitted(&self) -> bool {
        self.emitted
    }

    /// Feed one delta. Returns the preview text the first time it is due.
    pub fn push(&mut self, delta: &str) -> Option<String> {
        if self.emitted {
            return None;
        }
        self.buffer.push_str(delta);

        if let Some((idx, ch)) = self
            .buffer
            .char_indices()
            .find(|(_, ch)| SENTENCE_TERMINATORS.contains(ch))
        {
            self.emitted = true;
            let end = idx + ch.len_utf8();
            let preview = self.buffer[..end].to_string();
            self.buffer.clear();
            return Some(preview);
        }

        if self.started.elapsed() >= self.delay && !self.buffer.trim().is_empty() {
            self.emitted = true;
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }
}
