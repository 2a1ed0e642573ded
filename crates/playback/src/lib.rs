pub mod butler;
pub mod error;
pub mod image_ops;
pub mod piece;
pub mod player;
pub mod player_video;
pub mod prepare_pool;
pub mod ring_buffers;
pub mod subtitle_render;

pub use butler::{
    Butler, MAXIMUM_AUDIO_READAHEAD, MAXIMUM_VIDEO_READAHEAD, MINIMUM_AUDIO_READAHEAD,
    MINIMUM_VIDEO_READAHEAD,
};
pub use error::{ButlerError, PlaybackError, PlaybackResult};
pub use piece::Piece;
pub use player::{Player, PlayerChange, PlayerStatistics, PlayerText, TextEvent};
pub use player_video::{Overlay, PlayerVideo, Projection};
pub use ring_buffers::Caption;
