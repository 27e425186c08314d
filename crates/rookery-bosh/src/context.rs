//! Per-request processing context.

/// Explicit per-request state threaded through dispatch and polling.
///
/// Replaces implicit flags: `long_poll` gates whether the retry loop may
/// keep running at all, `long_poll_start` gates entry into the first poll
/// cycle, and `cycles_used` counts store queries performed.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Whether the long-poll loop is still enabled for this request.
    ///
    /// Cleared when an immediate iq reply or fresh content means the
    /// response should be returned without further waiting.
    pub long_poll: bool,

    /// Whether the first long-poll cycle may be entered.
    ///
    /// Cleared by a non-empty presence-handler result: a presence exchange
    /// counts as the session already being primed, so the very first
    /// long-poll does not run.
    pub long_poll_start: bool,

    /// Number of poll cycles performed so far.
    pub cycles_used: u32,
}

impl RequestContext {
    /// Create a fresh context for one request.
    pub fn new() -> Self {
        Self {
            long_poll: true,
            long_poll_start: true,
            cycles_used: 0,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
