use ffmpeg_the_third as ffmpeg;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot read DCP: {0}")]
    DcpRead(String),

    #[error("unsupported content: {0}")]
    Unsupported(String),
}

impl MediaError {
    pub fn dcp_read(msg: impl Into<String>) -> Self {
        Self::DcpRead(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}
