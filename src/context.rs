//! Running conversation context
//!
//! Every completed exchange is kept; a [`ContextPolicy`] decides which of them
//! are rendered into the next prompt. Rendering format per exchange:
//!
//! ```text
//! \nUser: <caller text>\nDispatcher: <dispatcher reply>
//! ```

use std::fmt::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// One completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub dispatcher: String,
}

impl Exchange {
    pub fn new(user: impl Into<String>, dispatcher: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            dispatcher: dispatcher.into(),
        }
    }

    fn render_into(&self, out: &mut String) {
        // Writing into a String cannot fail
        let _ = write!(out, "\nUser: {}\nDispatcher: {}", self.user, self.dispatcher);
    }

    /// Length in bytes of this exchange once rendered
    pub fn rendered_len(&self) -> usize {
        "\nUser: ".len() + self.user.len() + "\nDispatcher: ".len() + self.dispatcher.len()
    }

    /// Length in characters of this exchange once rendered
    pub fn rendered_chars(&self) -> usize {
        "\nUser: ".len()
            + self.user.chars().count()
            + "\nDispatcher: ".len()
            + self.dispatcher.chars().count()
    }
}

/// Chooses which exchanges go into the prompt. Always a suffix (newest last).
pub trait ContextPolicy: Send + Sync + fmt::Debug {
    fn select<'a>(&self, exchanges: &'a [Exchange]) -> &'a [Exchange];
}

/// Every exchange, forever
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl ContextPolicy for Unbounded {
    fn select<'a>(&self, exchanges: &'a [Exchange]) -> &'a [Exchange] {
        exchanges
    }
}

/// The newest `max_exchanges` exchanges
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    pub max_exchanges: usize,
}

impl ContextPolicy for SlidingWindow {
    fn select<'a>(&self, exchanges: &'a [Exchange]) -> &'a [Exchange] {
        let start = exchanges.len().saturating_sub(self.max_exchanges);
        exchanges.get(start..).unwrap_or_default()
    }
}

/// The newest exchanges whose rendered text fits in `max_chars` characters.
/// An exchange that alone exceeds the budget is not rendered.
#[derive(Debug, Clone, Copy)]
pub struct CharBudget {
    pub max_chars: usize,
}

impl ContextPolicy for CharBudget {
    fn select<'a>(&self, exchanges: &'a [Exchange]) -> &'a [Exchange] {
        let mut used = 0;
        let mut start = exchanges.len();
        for exchange in exchanges.iter().rev() {
            used += exchange.rendered_chars();
            if used > self.max_chars {
                break;
            }
            start -= 1;
        }
        exchanges.get(start..).unwrap_or_default()
    }
}

/// Policy as configured, e.g. `unbounded`, `window:20`, `chars:16000`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySetting {
    Unbounded,
    Window(usize),
    Chars(usize),
}

impl PolicySetting {
    pub fn build(self) -> Arc<dyn ContextPolicy> {
        match self {
            Self::Unbounded => Arc::new(Unbounded),
            Self::Window(max_exchanges) => Arc::new(SlidingWindow { max_exchanges }),
            Self::Chars(max_chars) => Arc::new(CharBudget { max_chars }),
        }
    }
}

/// Every exchange is rendered unless a limit is configured
impl Default for PolicySetting {
    fn default() -> Self {
        Self::Unbounded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid context policy '{0}' (expected unbounded, window:<n> or chars:<n>)")]
pub struct InvalidPolicy(pub String);

impl FromStr for PolicySetting {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }
        let invalid = || InvalidPolicy(s.to_string());
        let (kind, limit) = s.split_once(':').ok_or_else(invalid)?;
        let limit: usize = limit.trim().parse().map_err(|_| invalid())?;
        if limit == 0 {
            return Err(invalid());
        }
        match kind.trim() {
            "window" => Ok(Self::Window(limit)),
            "chars" => Ok(Self::Chars(limit)),
            _ => Err(invalid()),
        }
    }
}

/// Exchanges of one session plus the policy that renders them
#[derive(Debug, Clone)]
pub struct ConversationContext {
    exchanges: Vec<Exchange>,
    policy: Arc<dyn ContextPolicy>,
}

impl ConversationContext {
    pub fn new(policy: Arc<dyn ContextPolicy>) -> Self {
        Self {
            exchanges: Vec::new(),
            policy,
        }
    }

    pub fn push(&mut self, exchange: Exchange) {
        self.exchanges.push(exchange);
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Text for the context segment of the next prompt. Empty before the first exchange.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let selected = self.policy.select(&self.exchanges);
        if selected.len() < self.exchanges.len() {
            tracing::debug!(
                kept = selected.len(),
                dropped = self.exchanges.len() - selected.len(),
                policy = ?self.policy,
                "Context trimmed for prompt"
            );
        }

        let mut out = String::with_capacity(selected.iter().map(Exchange::rendered_len).sum());
        for exchange in selected {
            exchange.render_into(&mut out);
        }
        out
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(Arc::new(Unbounded))
    }
}
