//! Streaming response parser (spec §4.2, component C3): splits the LLM's
//! token stream into a live-narration prefix and a trailing structured
//! payload at the `<<<JSON>>>` marker, plus a fallback character-level
//! scanner for providers that omit the marker, plus the partial-JSON repair
//! pass used only for the adventure outline (spec §4.2, §8 scenario S4).
//!
//! Grounded on the teacher's `infrastructure::cache::TtlCache` style of a
//! small, self-contained, heavily unit-tested state machine
//! (`use_cases::queues::response_parser` for the "scan for a tagged field"
//! idiom) generalized from XML tags to the JSON-marker contract.

pub const MARKER: &str = "<<<JSON>>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    PreMarker,
    PostMarker,
}

/// Splits incoming text chunks at the literal `<<<JSON>>>` marker.
#[derive(Debug, Default)]
pub struct TextSplitParser {
    phase: Option<Phase>,
    /// Unconfirmed tail that might still be the start of the marker.
    pending: String,
    narration: String,
    json_buf: String,
}

impl TextSplitParser {
    pub fn new() -> Self {
        Self {
            phase: Some(Phase::PreMarker),
            pending: String::new(),
            narration: String::new(),
            json_buf: String::new(),
        }
    }

    /// Feed one chunk of text, returning the narration substring that is now
    /// safe to forward to the caller (empty once the marker has been seen).
    pub fn process_chunk(&mut self, chunk: &str) -> String {
        match self.phase.unwrap_or(Phase::PostMarker) {
            Phase::PostMarker => {
                self.json_buf.push_str(chunk);
                String::new()
            }
            Phase::PreMarker => {
                let mut buf = std::mem::take(&mut self.pending);
                buf.push_str(chunk);

                if let Some(idx) = buf.find(MARKER) {
                    let emit = buf[..idx].to_string();
                    self.json_buf.push_str(&buf[idx + MARKER.len()..]);
                    self.phase = Some(Phase::PostMarker);
                    self.narration.push_str(&emit);
                    emit
                } else {
                    let overlap = overlap_len(&buf, MARKER);
                    let split_at = buf.len() - overlap;
                    let emit = buf[..split_at].to_string();
                    self.pending = buf[split_at..].to_string();
                    self.narration.push_str(&emit);
                    emit
                }
            }
        }
    }

    /// The JSON payload accumulated after the marker, trimmed. Meaningful
    /// once streaming has completed.
    pub fn json(&self) -> String {
        self.json_buf.trim().to_string()
    }

    /// All narration forwarded so far (the narration prefix of the complete
    /// stream — spec §8 property 5).
    pub fn narration(&self) -> &str {
        &self.narration
    }

    pub fn has_seen_marker(&self) -> bool {
        self.phase == Some(Phase::PostMarker)
    }
}

/// Length of the longest suffix of `buf` that is also a prefix of `marker`,
/// capped below `marker.len()` (a full match is handled by `find` already).
fn overlap_len(buf: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(buf.len());
    for len in (1..=max).rev() {
        if buf.ends_with(&marker[..len]) {
            return len;
        }
    }
    0
}

const NARRATION_KEY: &str = "\"narrationText\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldState {
    ScanningForKey,
    AwaitingColon,
    AwaitingOpenQuote,
    StreamingValue,
    Done,
}

/// Fallback parser for providers that omit the `<<<JSON>>>` marker: scans
/// the raw JSON character-by-character for the `narrationText` key and
/// streams its string value out in real time as it arrives, unescaping
/// `\n`, `\"`, `\\`. Brace depth is tracked so callers can tell when the
/// top-level object has closed even though narration streaming itself does
/// not need it.
#[derive(Debug)]
pub struct JsonFieldParser {
    state: FieldState,
    /// Rolling window of the last `NARRATION_KEY.len()` characters seen
    /// while scanning, used to detect the key regardless of chunk boundaries.
    window: String,
    escape: bool,
    depth: i32,
    raw: String,
}

impl Default for JsonFieldParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonFieldParser {
    pub fn new() -> Self {
        Self {
            state: FieldState::ScanningForKey,
            window: String::new(),
            escape: false,
            depth: 0,
            raw: String::new(),
        }
    }

    /// Feed one chunk, returning any newly-streamable narration text.
    pub fn process_chunk(&mut self, chunk: &str) -> String {
        self.raw.push_str(chunk);
        let mut out = String::new();
        for ch in chunk.chars() {
            match self.state {
                FieldState::Done => {}
                FieldState::ScanningForKey => {
                    match ch {
                        '{' => self.depth += 1,
                        '}' => self.depth -= 1,
                        _ => {}
                    }
                    self.window.push(ch);
                    if self.window.len() > NARRATION_KEY.len() {
                        let overflow = self.window.len() - NARRATION_KEY.len();
                        self.window = self.window[overflow..].to_string();
                    }
                    if self.window == NARRATION_KEY {
                        self.state = FieldState::AwaitingColon;
                    }
                }
                FieldState::AwaitingColon | FieldState::AwaitingOpenQuote | FieldState::StreamingValue => {
                    self.advance_value_state(ch, &mut out);
                }
            }
        }
        out
    }

    fn advance_value_state(&mut self, ch: char, out: &mut String) {
        match self.state {
            FieldState::AwaitingColon => {
                if ch.is_whitespace() {
                } else if ch == ':' {
                    self.state = FieldState::AwaitingOpenQuote;
                } else {
                    self.state = FieldState::Done;
                }
            }
            FieldState::AwaitingOpenQuote => {
                if ch.is_whitespace() {
                } else if ch == '"' {
                    self.state = FieldState::StreamingValue;
                } else {
                    self.state = FieldState::Done;
                }
            }
            FieldState::StreamingValue => {
                if self.escape {
                    self.escape = false;
                    out.push(match ch {
                        'n' => '\n',
                        't' => '\t',
                        '"' => '"',
                        '\\' => '\\',
                        other => other,
                    });
                } else if ch == '\\' {
                    self.escape = true;
                } else if ch == '"' {
                    self.state = FieldState::Done;
                } else {
                    out.push(ch);
                }
            }
            _ => {}
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn object_depth(&self) -> i32 {
        self.depth
    }

    /// Scans a complete (non-streaming) JSON buffer for the narration key.
    /// Used by tests and as a non-streaming equivalent of `process_chunk`.
    pub fn extract_narration_from_complete(json: &str) -> Option<String> {
        let key_idx = json.find(NARRATION_KEY)?;
        let after_key = &json[key_idx + NARRATION_KEY.len()..];
        let colon_idx = after_key.find(':')?;
        let after_colon = after_key[colon_idx + 1..].trim_start();
        let after_quote = after_colon.strip_prefix('"')?;
        let mut result = String::new();
        let mut escape = false;
        for ch in after_quote.chars() {
            if escape {
                result.push(match ch {
                    'n' => '\n',
                    't' => '\t',
                    '"' => '"',
                    '\\' => '\\',
                    other => other,
                });
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                return Some(result);
            } else {
                result.push(ch);
            }
        }
        Some(result)
    }
}

/// Repairs a syntactically truncated JSON payload by appending the minimum
/// number of `}`/`]` tokens needed to balance it (spec §4.2, used only for
/// the adventure outline / step 1).
pub fn repair_partial_json(truncated: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in truncated.chars() {
        if in_string {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = truncated.to_string();
    // An unterminated string at truncation time must be closed before the
    // structural brackets can be appended.
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}
