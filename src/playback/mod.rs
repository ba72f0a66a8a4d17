//! Trace playback: orchestration, listeners and progress.

pub mod player;
pub mod progress;

pub use player::{play, PlaybackListener, PlaybackSummary, StopHandle};
pub use progress::{
    ProgressPublisher, ProgressTransport, ProgressUpdate, WriterTransport,
    DEFAULT_UPDATE_EVENTS, DEFAULT_UPDATE_PERIOD,
};
