pub mod change;
pub mod content;
pub mod film;
pub mod frame_rate;
pub mod geometry;
pub mod playlist;
pub mod time;
pub mod xml;

pub use change::{ChangeGuard, ChangeType, Signal};
pub use content::{Content, ContentId, Source, TextKind};
pub use film::Film;
pub use frame_rate::FrameRateChange;
pub use geometry::{Crop, Position, Rect, Size};
pub use playlist::{ContentChange, Playlist};
pub use time::{ContentTime, ContentTimePeriod, DcpTime, DcpTimePeriod, HZ};
