use reelforge_media::MediaError;

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Errors produced on the decode side of playback.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("subtitle render error: {0}")]
    Render(String),

    /// An invariant was broken; the upstream code is wrong, not the content.
    #[error("programming error: {0}")]
    Programming(String),
}

impl PlaybackError {
    pub fn programming(msg: impl Into<String>) -> Self {
        Self::Programming(msg.into())
    }
}

/// Errors surfaced to Butler consumers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ButlerError {
    /// Playback is suspended while a change settles; retry shortly.
    #[error("suspended; try again")]
    Again,

    /// Normal end of stream.
    #[error("end of stream")]
    Finished,

    /// The driver or a prepare worker hit an error; playback is over.
    #[error("playback died: {0}")]
    Dead(String),
}
