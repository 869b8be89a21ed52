//! Input sequencing for incremental decodes.
//!
//! [`StreamingLexer`] pulls chunks from a [`ByteSource`] and hands each one to
//! a state handler, which answers with a [`Transition`]. When the source has
//! nothing to offer the lexer yields; the caller drives it again once more
//! bytes are available. End of data moves the lexer into its finished state,
//! whose handler must terminate.

use std::sync::Arc;

use tracing::{debug, error};

use crate::source::{ByteSource, Resumable, SourceState};
use crate::types::DecodeError;

/// States of the decode input loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Consuming compressed bytes; no upper bound on how many.
    ReadingData,
    /// The source signalled end of data.
    Finished,
}

/// What a state handler wants the lexer to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Keep delivering whole chunks to `State`, with no declared length.
    ContinueUnbuffered(State),
    TerminateSuccess,
    TerminateFailure(DecodeError),
}

/// Outcome of a single [`StreamingLexer::lex`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum LexerResult {
    /// Suspended until the source has more data.
    Yield,
    /// The decode finished, successfully or not.
    Terminal(Result<(), DecodeError>),
}

#[derive(Debug)]
pub struct StreamingLexer {
    state: State,
    finished: State,
    terminal: Option<Result<(), DecodeError>>,
}

impl StreamingLexer {
    /// Start in `initial`; move to `finished` when the source ends.
    pub fn new(initial: State, finished: State) -> Self {
        Self {
            state: initial,
            finished,
            terminal: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.terminal.is_some()
    }

    /// Run `handler` over chunks until it terminates or the source runs dry.
    ///
    /// Once terminated, further calls return the same terminal result without
    /// touching the source or the handler.
    pub fn lex<S, F>(
        &mut self,
        source: &mut S,
        on_resume: Option<Arc<dyn Resumable>>,
        mut handler: F,
    ) -> LexerResult
    where
        S: ByteSource + ?Sized,
        F: FnMut(State, &[u8]) -> Transition,
    {
        if let Some(result) = &self.terminal {
            return LexerResult::Terminal(result.clone());
        }

        let mut on_resume = on_resume;
        loop {
            let transition = match source.advance() {
                SourceState::Ready(chunk) => handler(self.state, chunk),
                SourceState::Waiting => {
                    if let Some(resume) = on_resume.take() {
                        source.wait(resume);
                    }
                    return LexerResult::Yield;
                }
                SourceState::Complete => {
                    debug!(from = ?self.state, "end of data");
                    self.state = self.finished;
                    match handler(self.state, &[]) {
                        Transition::ContinueUnbuffered(state) => {
                            error!(?state, "handler asked to continue after end of data");
                            Transition::TerminateFailure(DecodeError::UnreachableStateReached(
                                "continued past end of data",
                            ))
                        }
                        terminal => terminal,
                    }
                }
            };

            match transition {
                Transition::ContinueUnbuffered(state) => self.state = state,
                Transition::TerminateSuccess => return self.terminate(Ok(())),
                Transition::TerminateFailure(err) => return self.terminate(Err(err)),
            }
        }
    }

    fn terminate(&mut self, result: Result<(), DecodeError>) -> LexerResult {
        debug!(success = result.is_ok(), "lexer terminated");
        self.terminal = Some(result.clone());
        LexerResult::Terminal(result)
    }
}
