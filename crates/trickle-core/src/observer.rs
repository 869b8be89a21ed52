//! Notifications from a decode session to whoever manages the image.

use crate::types::{IntRect, Size};

/// Receives progress notifications from a [`DecodeSession`](crate::DecodeSession).
///
/// Ordering guarantees: `size_available` fires exactly once and before any
/// other notification. `frame_complete` and `decode_complete` fire at most
/// once each. A failed session sends nothing after the failure.
pub trait ImageObserver {
    fn size_available(&mut self, size: Size);

    /// A region needs repainting. `output_space` is `None` when it matches
    /// `input_space`.
    fn invalidated(&mut self, input_space: IntRect, output_space: Option<IntRect>);

    fn frame_complete(&mut self);

    fn decode_complete(&mut self);
}

impl ImageObserver for () {
    fn size_available(&mut self, _size: Size) {}

    fn invalidated(&mut self, _input_space: IntRect, _output_space: Option<IntRect>) {}

    fn frame_complete(&mut self) {}

    fn decode_complete(&mut self) {}
}

/// A single recorded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserverEvent {
    SizeAvailable(Size),
    Invalidated {
        input_space: IntRect,
        output_space: Option<IntRect>,
    },
    FrameComplete,
    DecodeComplete,
}

/// Observer that keeps every notification in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Vec<ObserverEvent>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ObserverEvent] {
        &self.events
    }

    /// The posted size, if any.
    pub fn size(&self) -> Option<Size> {
        self.events.iter().find_map(|e| match e {
            ObserverEvent::SizeAvailable(size) => Some(*size),
            _ => None,
        })
    }

    pub fn count(&self, matches: impl Fn(&ObserverEvent) -> bool) -> usize {
        self.events.iter().filter(|e| matches(e)).count()
    }
}

impl ImageObserver for RecordingObserver {
    fn size_available(&mut self, size: Size) {
        self.events.push(ObserverEvent::SizeAvailable(size));
    }

    fn invalidated(&mut self, input_space: IntRect, output_space: Option<IntRect>) {
        self.events.push(ObserverEvent::Invalidated {
            input_space,
            output_space,
        });
    }

    fn frame_complete(&mut self) {
        self.events.push(ObserverEvent::FrameComplete);
    }

    fn decode_complete(&mut self) {
        self.events.push(ObserverEvent::DecodeComplete);
    }
}
