//! Decode sessions: the public entry point for incremental decoding.
//!
//! A [`DecodeSession`] owns one engine, created lazily when the first chunk
//! arrives, and drives it through the [`StreamingLexer`]. The session moves
//! through [`SessionState`]:
//!
//! ```text
//! NoEngine --first chunk--> AwaitingMetadata --size posted--> AwaitingFrame --frame written--> Done
//!                                   |                              |
//!                                   +--(metadata only)-------------+--------------------------> Done
//! any state --invalid data / engine error / allocation / pipe / pixel count--> Failed
//! ```
//!
//! `Done` and `Failed` are terminal. A failed session is never resumed; the
//! caller discards it. Dropping or [abandoning](DecodeSession::abandon) a
//! session releases its engine without further notifications.

use std::sync::Arc;

use image::RgbaImage;
use tracing::{debug, error, trace, warn};

use crate::buffer::{ChunkBuffer, FrameBuffer};
use crate::engine::{EngineFactory, EngineHandle, EngineStatus};
use crate::lexer::{LexerResult, State, StreamingLexer, Transition};
use crate::observer::ImageObserver;
use crate::options::DecoderOptions;
use crate::pipe::{SurfacePipe, WriteState};
use crate::source::{ByteSource, ChunkedSource, Resumable};
use crate::types::{DecodeError, Size};

/// Lifecycle of a decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoEngine,
    AwaitingMetadata,
    AwaitingFrame,
    Done,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

/// Non-error outcome of [`DecodeSession::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting for more input; call `decode` again once the source has it.
    Suspended,
    /// The session reached `Done`.
    Complete,
}

/// A fully decoded frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Size posted by the engine.
    pub source_size: Size,
    /// Surface at the requested output size.
    pub image: RgbaImage,
}

/// One decode attempt for a single image.
pub struct DecodeSession<F: EngineFactory, O: ImageObserver = ()> {
    lexer: StreamingLexer,
    core: SessionCore<F, O>,
}

struct SessionCore<F: EngineFactory, O: ImageObserver> {
    factory: F,
    observer: O,
    options: DecoderOptions,
    engine: Option<EngineHandle<F::Engine>>,
    chunks: ChunkBuffer,
    size: Option<Size>,
    state: SessionState,
    surface: Option<RgbaImage>,
    error: Option<DecodeError>,
}

impl<F: EngineFactory> DecodeSession<F, ()> {
    /// Create a session without an observer.
    pub fn new(factory: F, options: DecoderOptions) -> Self {
        Self::with_observer(factory, options, ())
    }
}

impl<F: EngineFactory, O: ImageObserver> DecodeSession<F, O> {
    pub fn with_observer(factory: F, options: DecoderOptions, observer: O) -> Self {
        let chunks = ChunkBuffer::new(options.max_buffered_bytes);
        Self {
            lexer: StreamingLexer::new(State::ReadingData, State::Finished),
            core: SessionCore {
                factory,
                observer,
                options,
                engine: None,
                chunks,
                size: None,
                state: SessionState::NoEngine,
                surface: None,
                error: None,
            },
        }
    }

    /// Consume whatever `source` has available.
    ///
    /// Returns `Suspended` when the source runs dry before the decode
    /// finishes; `on_resume` is then registered with the source. Calling
    /// again after `Done` returns `Complete`, and after `Failed` returns the
    /// original error, without touching the source or the engine.
    #[tracing::instrument(
        skip_all,
        fields(metadata_only = self.core.options.metadata_only, state = ?self.core.state)
    )]
    pub fn decode<S>(
        &mut self,
        source: &mut S,
        on_resume: Option<Arc<dyn Resumable>>,
    ) -> Result<Progress, DecodeError>
    where
        S: ByteSource + ?Sized,
    {
        match self.core.state {
            SessionState::Done => return Ok(Progress::Complete),
            SessionState::Failed => return Err(self.core.terminal_error()),
            _ => {}
        }

        let core = &mut self.core;
        let result = self
            .lexer
            .lex(source, on_resume, |state, data| core.dispatch(state, data));

        match result {
            LexerResult::Yield => {
                trace!("suspended waiting for input");
                Ok(Progress::Suspended)
            }
            LexerResult::Terminal(Ok(())) => {
                self.core.succeed();
                Ok(Progress::Complete)
            }
            LexerResult::Terminal(Err(err)) => {
                self.core.fail(err.clone());
                Err(err)
            }
        }
    }

    /// Give up on the session. The engine is released; no notifications fire.
    pub fn abandon(mut self) {
        if !self.core.state.is_terminal() {
            debug!(state = ?self.core.state, "session abandoned");
        }
        self.core.release();
    }

    pub fn state(&self) -> SessionState {
        self.core.state
    }

    /// The posted image size, once known.
    pub fn size(&self) -> Option<Size> {
        self.core.size
    }

    pub fn is_metadata_only(&self) -> bool {
        self.core.options.metadata_only
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.core.options
    }

    /// The finished surface, available after a successful pixel decode.
    pub fn surface(&self) -> Option<&RgbaImage> {
        self.core.surface.as_ref()
    }

    pub fn take_surface(&mut self) -> Option<RgbaImage> {
        self.core.surface.take()
    }

    /// The terminal error of a failed session.
    pub fn error(&self) -> Option<&DecodeError> {
        self.core.error.as_ref()
    }

    pub fn observer(&self) -> &O {
        &self.core.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.core.observer
    }
}

impl<F: EngineFactory, O: ImageObserver> SessionCore<F, O> {
    fn dispatch(&mut self, state: State, data: &[u8]) -> Transition {
        match state {
            State::ReadingData => match self.read_data(data) {
                Ok(transition) => transition,
                Err(err) => Transition::TerminateFailure(err),
            },
            State::Finished => self.finished(),
        }
    }

    fn read_data(&mut self, chunk: &[u8]) -> Result<Transition, DecodeError> {
        if self.engine.is_none() {
            let handle = EngineHandle::create(&mut self.factory, self.options.metadata_only)?;
            self.engine = Some(handle);
            self.transition(SessionState::AwaitingMetadata);
        }

        // Once anything is buffered, every later chunk joins the buffer so the
        // engine always sees one contiguous span.
        let buffered = !self.chunks.is_empty();
        if buffered {
            if chunk.is_empty() {
                return Ok(Transition::ContinueUnbuffered(State::ReadingData));
            }
            self.chunks.append(chunk)?;
        }

        let status = {
            let span = if buffered {
                self.chunks.as_slice()
            } else {
                chunk
            };
            let engine = self
                .engine
                .as_mut()
                .ok_or(DecodeError::UnreachableStateReached("no engine while reading"))?;
            match engine.needed_bytes() {
                Some(hint) if span.len() < hint => {
                    trace!(len = span.len(), hint, "span shorter than engine hint");
                    EngineStatus::NeedMoreData
                }
                _ => {
                    trace!(len = span.len(), buffered, "feeding engine");
                    engine.feed(span)
                }
            }
        };

        match status {
            EngineStatus::Ok => {
                if buffered {
                    debug!(len = self.chunks.len(), "buffered span consumed");
                }
                self.chunks.clear();
                self.after_feed()
            }
            EngineStatus::NeedMoreData => {
                if !buffered {
                    self.chunks.append(chunk)?;
                }
                debug!(buffered = self.chunks.len(), "engine needs more data");
                Ok(Transition::ContinueUnbuffered(State::ReadingData))
            }
            EngineStatus::InvalidData => {
                warn!("engine rejected the compressed stream");
                Err(DecodeError::InvalidData(
                    "engine rejected the compressed stream".to_string(),
                ))
            }
            EngineStatus::Error => {
                warn!("engine failed while consuming input");
                Err(DecodeError::EngineInternalError(
                    "engine failed while consuming input".to_string(),
                ))
            }
        }
    }

    fn after_feed(&mut self) -> Result<Transition, DecodeError> {
        // Only query until the size is known, so a later successful query
        // can never post it again.
        if self.size.is_none() {
            let info = self.engine()?.query_info();
            if let Some(size) = info {
                self.post_size(size)?;
                if self.options.metadata_only {
                    debug!("metadata decode complete");
                    return Ok(Transition::TerminateSuccess);
                }
                self.transition(SessionState::AwaitingFrame);
            }
        }

        if self.options.metadata_only || !self.engine()?.is_frame_ready() {
            return Ok(Transition::ContinueUnbuffered(State::ReadingData));
        }

        let size = self.size.ok_or_else(|| {
            DecodeError::EngineInternalError("frame ready before image size was known".to_string())
        })?;
        self.write_frame(size)?;
        Ok(Transition::TerminateSuccess)
    }

    fn post_size(&mut self, size: Size) -> Result<(), DecodeError> {
        if let Some(existing) = self.size {
            error!(%existing, attempted = %size, "image size posted twice");
            return Err(DecodeError::SizePostedTwice {
                existing,
                attempted: size,
            });
        }
        if size.is_empty() {
            return Err(DecodeError::InvalidData(format!(
                "engine reported empty image size {size}"
            )));
        }
        debug!(%size, "posting image size");
        self.size = Some(size);
        self.observer.size_available(size);
        Ok(())
    }

    fn write_frame(&mut self, size: Size) -> Result<(), DecodeError> {
        let output = self.options.output_size.unwrap_or(size);
        let mut pipe = SurfacePipe::new(size, output, self.options.format, self.options.filter)?;
        let mut frame = FrameBuffer::allocate(size)?;

        let engine = self
            .engine
            .as_mut()
            .ok_or(DecodeError::UnreachableStateReached("no engine while decoding"))?;
        let written = engine.decode_frame(frame.pixels_mut())?;
        frame.verify_written(written)?;

        for (y, row) in frame.rows().enumerate() {
            if pipe.write_row(row) == WriteState::Failure {
                return Err(DecodeError::FrameWriteFailed { row: y as u32 });
            }
        }

        if let Some(rect) = pipe.take_invalid_rect() {
            let output_space = (rect.output_space != rect.input_space).then_some(rect.output_space);
            self.observer.invalidated(rect.input_space, output_space);
        }
        self.observer.frame_complete();
        self.observer.decode_complete();
        debug!(%size, %output, "frame written");
        self.surface = Some(pipe.into_surface());
        Ok(())
    }

    fn finished(&mut self) -> Transition {
        error!(state = ?self.state, "input ended before the decode finished");
        Transition::TerminateFailure(DecodeError::UnreachableStateReached(
            "input ended before the decode finished",
        ))
    }

    fn engine(&self) -> Result<&EngineHandle<F::Engine>, DecodeError> {
        self.engine
            .as_ref()
            .ok_or(DecodeError::UnreachableStateReached("no engine after feed"))
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "session state change");
        self.state = next;
    }

    fn succeed(&mut self) {
        self.transition(SessionState::Done);
        self.release();
    }

    fn fail(&mut self, err: DecodeError) {
        warn!(error = %err, "decode failed");
        self.transition(SessionState::Failed);
        self.error = Some(err);
        self.surface = None;
        self.release();
    }

    fn release(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.chunks.clear();
    }

    fn terminal_error(&self) -> DecodeError {
        self.error.clone().unwrap_or(DecodeError::UnreachableStateReached(
            "failed session without a recorded error",
        ))
    }
}

/// Decode a complete payload delivered as a single chunk.
pub fn decode_all<F: EngineFactory>(
    factory: F,
    bytes: &[u8],
    options: DecoderOptions,
) -> Result<DecodedFrame, DecodeError> {
    let options = DecoderOptions {
        metadata_only: false,
        ..options
    };
    let mut source = ChunkedSource::from_chunks([bytes]);
    let mut session = DecodeSession::new(factory, options);
    match session.decode(&mut source, None)? {
        Progress::Complete => {}
        Progress::Suspended => {
            return Err(DecodeError::UnreachableStateReached(
                "session suspended on a complete source",
            ))
        }
    }
    let source_size = session
        .size()
        .ok_or(DecodeError::UnreachableStateReached("decode completed without a size"))?;
    let image = session
        .take_surface()
        .ok_or(DecodeError::UnreachableStateReached("decode completed without a surface"))?;
    Ok(DecodedFrame { source_size, image })
}

/// Determine the image size without decoding pixels.
pub fn probe_size<F, I, C>(factory: F, chunks: I) -> Result<Size, DecodeError>
where
    F: EngineFactory,
    I: IntoIterator<Item = C>,
    C: Into<Vec<u8>>,
{
    let mut source = ChunkedSource::from_chunks(chunks);
    let mut session = DecodeSession::new(factory, DecoderOptions::metadata_only());
    session.decode(&mut source, None)?;
    session
        .size()
        .ok_or(DecodeError::UnreachableStateReached("probe completed without a size"))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::engine::testing::{toy_gradient, toy_payload, Counters, ToyConfig, ToyEngine};
    use crate::observer::RecordingObserver;
    use proptest::prelude::*;

    fn decode_chunks(chunks: Vec<Vec<u8>>, hint: bool) -> (Result<Progress, DecodeError>, RecordingObserver, Option<RgbaImage>) {
        let config = ToyConfig {
            declare_hint: hint,
            ..Default::default()
        };
        let counters = Counters::default();
        let mut session = DecodeSession::with_observer(
            ToyEngine::factory(config, counters.clone()),
            DecoderOptions::new(),
            RecordingObserver::new(),
        );
        let mut source = ChunkedSource::from_chunks(chunks);
        let result = session.decode(&mut source, None);
        let surface = session.take_surface();
        let observer = session.observer().clone();
        drop(session);
        assert_eq!(counters.destroys(), counters.creates());
        (result, observer, surface)
    }

    fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
        (1u16..=6, 1u16..=6).prop_map(|(w, h)| toy_payload(w, h, &toy_gradient(w, h)))
    }

    proptest! {
        /// Property: splitting the payload anywhere yields the same image and events.
        #[test]
        fn prop_chunking_does_not_change_output(
            payload in payload_strategy(),
            offsets in prop::collection::vec(0usize..200, 0..8),
            hint in any::<bool>(),
        ) {
            let (whole_result, whole_obs, whole_surface) = decode_chunks(vec![payload.clone()], hint);
            prop_assert_eq!(whole_result, Ok(Progress::Complete));

            let mut cuts: Vec<usize> = offsets.iter().map(|&o| o.min(payload.len())).collect();
            cuts.sort_unstable();
            let mut chunks = Vec::new();
            let mut start = 0;
            for cut in cuts {
                chunks.push(payload[start..cut].to_vec());
                start = cut;
            }
            chunks.push(payload[start..].to_vec());

            let (split_result, split_obs, split_surface) = decode_chunks(chunks, hint);
            prop_assert_eq!(split_result, Ok(Progress::Complete));
            prop_assert_eq!(whole_obs.events(), split_obs.events());
            prop_assert_eq!(whole_surface, split_surface);
        }

        /// Property: any strict prefix of a payload never completes.
        #[test]
        fn prop_prefix_never_succeeds(payload in payload_strategy(), cut in 0usize..200) {
            let cut = cut.min(payload.len() - 1);
            let (result, obs, surface) = decode_chunks(vec![payload[..cut].to_vec()], false);
            prop_assert!(result.is_err());
            prop_assert!(surface.is_none());
            prop_assert!(obs.count(|e| matches!(e, crate::observer::ObserverEvent::FrameComplete)) == 0);
        }
    }
}
