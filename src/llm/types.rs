//! Common types for backend calls

/// One `generate` call: ordered text segments plus sampling parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub segments: Vec<PromptSegment>,
    pub generation: GenerationConfig,
}

impl LlmRequest {
    /// Text of the first segment with the given role
    pub fn segment(&self, role: SegmentRole) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.role == role)
            .map(|s| s.text.as_str())
    }
}

/// A text segment of the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSegment {
    pub role: SegmentRole,
    pub text: String,
}

impl PromptSegment {
    pub fn new(role: SegmentRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Where a segment came from. Providers send all segments in order as one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    /// Fixed dispatcher contract
    SystemContract,
    /// Prior exchanges rendered as text
    Context,
    /// The caller's new message
    UserTurn,
}

/// Sampling parameters sent with every call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 8192,
        }
    }
}

/// Backend reply: one text blob
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub finish_reason: Option<String>,
    pub usage: Usage,
}

impl LlmResponse {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}
