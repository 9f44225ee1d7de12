// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Reasoning block separation
//!
//! Reasoning models inline their chain of thought in the content stream,
//! wrapped in delimiter tags (`<think>...</think>` by default). The splitter
//! strips the tags and tags every emitted delta as reasoning or visible.
//!
//! The network may flush in the middle of a tag, so any trailing text that
//! could still grow into a delimiter is held back until the next delta
//! settles it.

use crate::config::ReasoningConfig;

use super::streaming::StreamChunk;

/// Position of one response relative to its reasoning block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningState {
    /// Before any reasoning block
    #[default]
    Normal,
    /// Inside the reasoning block
    Thinking,
    /// The block is over; tags are plain text from here on
    Done,
}

/// Per-response state machine splitting reasoning from the answer
#[derive(Debug, Clone)]
pub struct ReasoningSplitter {
    enabled: bool,
    open_tag: String,
    close_tag: String,
    state: ReasoningState,
    /// Trailing text that may be the start of a delimiter
    pending: String,
    /// Id of the last chunk seen, reused for flushed text
    last_id: String,
}

impl ReasoningSplitter {
    /// Splitter with the default `<think>` tags
    pub fn new(enabled: bool) -> Self {
        Self::with_tags(enabled, &ReasoningConfig::default())
    }

    pub fn with_tags(enabled: bool, tags: &ReasoningConfig) -> Self {
        Self {
            enabled,
            open_tag: tags.open_tag.clone(),
            close_tag: tags.close_tag.clone(),
            state: ReasoningState::Normal,
            pending: String::new(),
            last_id: String::new(),
        }
    }

    pub fn state(&self) -> ReasoningState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Split one decoded chunk into tagged deltas.
    ///
    /// Text on each side of a delimiter becomes its own delta. A delta whose
    /// only content was a delimiter yields one empty chunk, so callers still
    /// observe the transition. Text held back as a possible partial tag
    /// yields nothing yet. A chunk carrying a finish reason also flushes
    /// held-back text, and the finish reason lands on the last delta.
    pub fn push(&mut self, chunk: StreamChunk) -> Vec<StreamChunk> {
        if !self.enabled {
            return vec![chunk.thinking(false)];
        }

        let StreamChunk {
            id,
            content,
            finish_reason,
            ..
        } = chunk;
        self.last_id.clone_from(&id);

        let mut text = std::mem::take(&mut self.pending);
        text.push_str(&content);

        let mut touched_thinking = self.state == ReasoningState::Thinking;
        let mut consumed_tag = false;
        let mut segments: Vec<(String, bool)> = Vec::new();
        let mut rest = text.as_str();

        loop {
            match self.state {
                ReasoningState::Done => {
                    segments.push((rest.to_string(), false));
                    break;
                }
                ReasoningState::Normal => {
                    match self.next_tag_in_normal(rest) {
                        Some((at, tag_len, next)) => {
                            segments.push((rest[..at].to_string(), false));
                            self.transition(next);
                            touched_thinking |= next == ReasoningState::Thinking;
                            consumed_tag = true;
                            rest = &rest[at + tag_len..];
                        }
                        None => {
                            let hold = longest_suffix_prefix(rest, &self.open_tag)
                                .max(longest_suffix_prefix(rest, &self.close_tag));
                            let (emit, held) = rest.split_at(rest.len() - hold);
                            segments.push((emit.to_string(), false));
                            self.pending = held.to_string();
                            break;
                        }
                    }
                }
                ReasoningState::Thinking => match rest.find(self.close_tag.as_str()) {
                    Some(at) => {
                        segments.push((rest[..at].to_string(), true));
                        self.transition(ReasoningState::Done);
                        consumed_tag = true;
                        rest = &rest[at + self.close_tag.len()..];
                    }
                    None => {
                        let hold = longest_suffix_prefix(rest, &self.close_tag);
                        let (emit, held) = rest.split_at(rest.len() - hold);
                        segments.push((emit.to_string(), true));
                        self.pending = held.to_string();
                        break;
                    }
                },
            }
        }

        let mut out: Vec<StreamChunk> = segments
            .into_iter()
            .filter(|(text, _)| !text.is_empty())
            .map(|(text, thinking)| StreamChunk::new(id.clone(), text).thinking(thinking))
            .collect();

        if out.is_empty() && consumed_tag {
            out.push(StreamChunk::new(id.clone(), "").thinking(touched_thinking));
        }

        if let Some(reason) = finish_reason {
            out.extend(self.flush());
            match out.last_mut() {
                Some(last) => last.finish_reason = Some(reason),
                None => out.push(
                    StreamChunk::new(id, "")
                        .thinking(self.state == ReasoningState::Thinking)
                        .with_finish_reason(reason),
                ),
            }
        }

        out
    }

    /// Release held-back text as a literal delta.
    ///
    /// Called when the stream ends without a finish reason; a tag that never
    /// completed was just text.
    pub fn flush(&mut self) -> Option<StreamChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let text = std::mem::take(&mut self.pending);
        Some(
            StreamChunk::new(self.last_id.clone(), text)
                .thinking(self.state == ReasoningState::Thinking),
        )
    }

    /// Earliest delimiter in `text` while no block has been seen.
    ///
    /// A closing tag here means the model skipped the opening one; it still
    /// ends the (implicit) block.
    fn next_tag_in_normal(&self, text: &str) -> Option<(usize, usize, ReasoningState)> {
        let open = text
            .find(self.open_tag.as_str())
            .map(|at| (at, self.open_tag.len(), ReasoningState::Thinking));
        let close = text
            .find(self.close_tag.as_str())
            .map(|at| (at, self.close_tag.len(), ReasoningState::Done));

        match (open, close) {
            (Some(o), Some(c)) => Some(if c.0 < o.0 { c } else { o }),
            (o, c) => o.or(c),
        }
    }

    fn transition(&mut self, next: ReasoningState) {
        tracing::debug!(from = ?self.state, to = ?next, "reasoning state change");
        self.state = next;
    }
}

/// Length of the longest proper prefix of `needle` that `haystack` ends with
fn longest_suffix_prefix(haystack: &str, needle: &str) -> usize {
    let max = needle.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|&len| needle.is_char_boundary(len) && haystack.ends_with(&needle[..len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed(splitter: &mut ReasoningSplitter, deltas: &[&str]) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        for delta in deltas {
            for chunk in splitter.push(StreamChunk::new("r1", *delta)) {
                out.push((chunk.content, chunk.thinking));
            }
        }
        if let Some(chunk) = splitter.flush() {
            out.push((chunk.content, chunk.thinking));
        }
        out
    }

    fn tagged(pairs: &[(&str, bool)]) -> Vec<(String, bool)> {
        pairs.iter().map(|(s, t)| (s.to_string(), *t)).collect()
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut splitter = ReasoningSplitter::new(false);
        let out = feed(&mut splitter, &["<think>", "plan", "</think>"]);
        assert_eq!(
            out,
            tagged(&[("<think>", false), ("plan", false), ("</think>", false)])
        );
    }

    #[test]
    fn test_tag_per_delta_sequence() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["<think>", "plan", "</think>", "answer"]);
        assert_eq!(
            out,
            tagged(&[("", true), ("plan", true), ("", true), ("answer", false)])
        );
        assert_eq!(splitter.state(), ReasoningState::Done);
    }

    #[test]
    fn test_open_tag_split_across_deltas() {
        let mut splitter = ReasoningSplitter::new(true);
        assert!(splitter.push(StreamChunk::new("r1", "<th")).is_empty());
        assert_eq!(splitter.state(), ReasoningState::Normal);

        let out = splitter.push(StreamChunk::new("r1", "ink>rest"));
        assert_eq!(out, vec![StreamChunk::new("r1", "rest").thinking(true)]);
        assert_eq!(splitter.state(), ReasoningState::Thinking);
    }

    #[test]
    fn test_close_tag_split_across_deltas() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["<think>plan</th", "ink>ans", "wer"]);
        assert_eq!(
            out,
            tagged(&[("plan", true), ("ans", false), ("wer", false)])
        );
    }

    #[test]
    fn test_whole_block_in_one_delta() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["intro <think>plan</think>answer"]);
        assert_eq!(
            out,
            tagged(&[("intro ", false), ("plan", true), ("answer", false)])
        );
    }

    #[test]
    fn test_done_is_sticky() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(
            &mut splitter,
            &["<think>a</think>b", "<think>c", "</think>d"],
        );
        assert_eq!(
            out,
            tagged(&[
                ("a", true),
                ("b", false),
                ("<think>c", false),
                ("</think>d", false)
            ])
        );
    }

    #[test]
    fn test_nested_open_tag_inside_block_is_literal() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["<think>x<think>y</think>z"]);
        assert_eq!(out, tagged(&[("x<think>y", true), ("z", false)]));
    }

    #[test]
    fn test_stray_close_tag_ends_implicit_block() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["plan</think>", "answer <think>"]);
        assert_eq!(out, tagged(&[("plan", false), ("answer <think>", false)]));
        assert_eq!(splitter.state(), ReasoningState::Done);
    }

    #[test]
    fn test_incomplete_tag_flushed_as_text_at_end() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = feed(&mut splitter, &["a <thi"]);
        assert_eq!(out, tagged(&[("a ", false), ("<thi", false)]));
    }

    #[test]
    fn test_finish_reason_flushes_and_lands_on_last_delta() {
        let mut splitter = ReasoningSplitter::new(true);
        assert_eq!(
            splitter.push(StreamChunk::new("r1", "<think>hmm</thi")),
            vec![StreamChunk::new("r1", "hmm").thinking(true)]
        );

        let out = splitter.push(StreamChunk::new("r1", "").with_finish_reason("stop"));
        assert_eq!(
            out,
            vec![StreamChunk::new("r1", "</thi")
                .thinking(true)
                .with_finish_reason("stop")]
        );
        assert!(splitter.flush().is_none());
    }

    #[test]
    fn test_empty_finish_chunk_is_forwarded() {
        let mut splitter = ReasoningSplitter::new(true);
        let out = splitter.push(StreamChunk::new("r1", "").with_finish_reason("stop"));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_final());
        assert!(!out[0].thinking);
    }

    #[test]
    fn test_custom_tags() {
        let tags = ReasoningConfig {
            open_tag: "[[r]]".to_string(),
            close_tag: "[[/r]]".to_string(),
        };
        let mut splitter = ReasoningSplitter::with_tags(true, &tags);
        let out = feed(&mut splitter, &["[[", "r]]why[[/", "r]]so"]);
        assert_eq!(out, tagged(&[("why", true), ("so", false)]));
    }

    #[test]
    fn test_longest_suffix_prefix() {
        assert_eq!(longest_suffix_prefix("abc<th", "<think>"), 3);
        assert_eq!(longest_suffix_prefix("abc", "<think>"), 0);
        assert_eq!(longest_suffix_prefix("<", "<think>"), 1);
        // A complete tag is never held back.
        assert_eq!(longest_suffix_prefix("<think>", "<think>"), 0);
        assert_eq!(longest_suffix_prefix("x\u{e9}", "\u{e9}t"), 2);
    }

    /// Oracle over the whole raw text: (visible, reasoning)
    fn reference(raw: &str) -> (String, String) {
        let (open, close) = ("<think>", "</think>");
        let first_open = raw.find(open);
        let first_close = raw.find(close);
        match (first_open, first_close) {
            (Some(o), c) if c.map_or(true, |c| o < c) => {
                let before = &raw[..o];
                let after = &raw[o + open.len()..];
                match after.find(close) {
                    Some(c) => (
                        format!("{}{}", before, &after[c + close.len()..]),
                        after[..c].to_string(),
                    ),
                    None => (before.to_string(), after.to_string()),
                }
            }
            (_, Some(c)) => (
                format!("{}{}", &raw[..c], &raw[c + close.len()..]),
                String::new(),
            ),
            _ => (raw.to_string(), String::new()),
        }
    }

    fn raw_text() -> impl Strategy<Value = String> {
        let piece = prop_oneof![
            Just("<think>".to_string()),
            Just("</think>".to_string()),
            "[a-c <>/\u{e9}]{0,6}",
        ];
        prop::collection::vec(piece, 0..8).prop_map(|pieces| pieces.concat())
    }

    fn chunked(raw: &str, cuts: &[usize]) -> Vec<String> {
        let chars: Vec<char> = raw.chars().collect();
        let mut cuts: Vec<usize> = cuts.iter().map(|c| c % (chars.len() + 1)).collect();
        cuts.sort_unstable();
        cuts.dedup();

        let mut deltas = Vec::new();
        let mut start = 0;
        for cut in cuts.into_iter().chain(std::iter::once(chars.len())) {
            deltas.push(chars[start..cut].iter().collect());
            start = cut;
        }
        deltas
    }

    proptest! {
        #[test]
        fn prop_reconstructs_streams_under_any_chunking(
            raw in raw_text(),
            cuts in prop::collection::vec(any::<usize>(), 0..10),
        ) {
            let deltas = chunked(&raw, &cuts);
            let refs: Vec<&str> = deltas.iter().map(String::as_str).collect();

            let mut splitter = ReasoningSplitter::new(true);
            let out = feed(&mut splitter, &refs);

            let visible: String = out.iter().filter(|(_, t)| !t).map(|(s, _)| s.as_str()).collect();
            let reasoning: String = out.iter().filter(|(_, t)| *t).map(|(s, _)| s.as_str()).collect();

            let (expected_visible, expected_reasoning) = reference(&raw);
            prop_assert_eq!(visible, expected_visible);
            prop_assert_eq!(reasoning, expected_reasoning);
        }
    }
}
