/// The progress of a single request/response cycle.
///
/// `Idle -> Sending -> AwaitingHeaders -> (SkipInterim)* -> ParsingHeaders
/// -> StreamingBody -> Done`, with `Failed` reachable from `Sending` and
/// `ParsingHeaders`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing sent yet.
    #[default]
    Idle,

    /// Connecting and writing the request head and body.
    Sending,

    /// Request written, waiting for the first response header block.
    AwaitingHeaders,

    /// An interim `100 Continue` block was received and is being skipped.
    SkipInterim,

    /// The final header block is being parsed.
    ParsingHeaders,

    /// Reading the response body.
    StreamingBody,

    /// Response head parsed and body fully received.
    Done,

    /// Connection-level failure or malformed response. Terminal.
    Failed,
}

impl LoadState {
    /// Whether moving from `self` to `next` is a legal step of the machine.
    pub fn can_advance_to(self, next: LoadState) -> bool {
        use LoadState::*;
        matches!(
            (self, next),
            (Idle, Sending)
                | (Sending, AwaitingHeaders)
                | (Sending, Failed)
                | (AwaitingHeaders, SkipInterim)
                | (AwaitingHeaders, ParsingHeaders)
                | (AwaitingHeaders, Failed)
                | (SkipInterim, SkipInterim)
                | (SkipInterim, ParsingHeaders)
                | (SkipInterim, Failed)
                | (ParsingHeaders, StreamingBody)
                | (ParsingHeaders, Failed)
                | (StreamingBody, Done)
                | (StreamingBody, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Done | LoadState::Failed)
    }
}
