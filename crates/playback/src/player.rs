use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use reelforge_audio::{remap, AudioBuffers};
use reelforge_media::decoders::{
    DcpDecoder, FfmpegDecoder, ImageSequenceDecoder, SoundDecoder, SubRipDecoder,
};
use reelforge_media::{self as media, BitmapSubtitle, Decoder, ImageProxy, StringSubtitle};
use reelforge_state::change::{ChangeType, Signal};
use reelforge_state::content::{property, Content, Source, TextKind, TextPart};
use reelforge_state::film::Film;
use reelforge_state::frame_rate::FrameRateChange;
use reelforge_state::playlist::Playlist;
use reelforge_state::time::{ContentTime, ContentTimePeriod, DcpTime, DcpTimePeriod};
use reelforge_state::{Crop, Size};
use tracing::debug;

use crate::error::PlaybackResult;
use crate::image_ops;
use crate::piece::Piece;
use crate::player_video::{Overlay, PlayerVideo};
use crate::subtitle_render;

/// Property ids for changes originating in the Player itself rather than in
/// content.
pub mod player_property {
    pub const VIDEO_CONTAINER_SIZE: u32 = 700;
    pub const PLAYLIST: u32 = 701;
    pub const FILM_CONTAINER: u32 = 702;
    pub const FILM_VIDEO_FRAME_RATE: u32 = 703;
}

/// Subtitle payload passed through to consumers (closed captions reach the
/// Butler's caption queue without being rendered).
#[derive(Clone, Debug, Default)]
pub struct PlayerText {
    pub strings: Vec<StringSubtitle>,
    pub bitmaps: Vec<BitmapSubtitle>,
}

#[derive(Clone, Debug)]
pub struct TextEvent {
    pub text: PlayerText,
    pub kind: TextKind,
    pub track: Option<String>,
    pub period: DcpTimePeriod,
}

#[derive(Clone, Copy, Debug)]
pub struct PlayerChange {
    pub change: ChangeType,
    pub property: u32,
    pub frequent: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PlayerStatistics {
    pub video_good: u64,
    pub video_black: u64,
    pub audio_good: u64,
    pub audio_silent: u64,
}

pub type VideoEmission = (Arc<PlayerVideo>, DcpTime);
pub type AudioEmission = (AudioBuffers, DcpTime, i32);

/// Composes the playlist into a single stream of video, audio and text.
///
/// `get_video` / `get_audio` answer for any timeline point; `pass` walks the
/// timeline emitting through the signals, which is how the Butler drives it.
pub struct Player {
    film: Film,
    playlist: Arc<Playlist>,
    pieces: Vec<Piece>,
    have_valid_pieces: Arc<AtomicBool>,
    container: Size,
    black: Arc<RgbaImage>,
    approximate_size: bool,
    always_burn_open_subtitles: bool,
    ignore_video: bool,
    ignore_audio: bool,
    ignore_text: bool,
    position: DcpTime,
    stats: PlayerStatistics,

    pub video_signal: Arc<Signal<VideoEmission>>,
    pub audio_signal: Arc<Signal<AudioEmission>>,
    pub text_signal: Arc<Signal<TextEvent>>,
    pub change_signal: Arc<Signal<PlayerChange>>,
}

impl Player {
    pub fn new(film: Film, playlist: Arc<Playlist>) -> Self {
        let have_valid_pieces = Arc::new(AtomicBool::new(false));
        let change_signal: Arc<Signal<PlayerChange>> = Arc::new(Signal::new());

        // Structure changes invalidate the pieces and surface as a playlist
        // change.
        {
            let valid = have_valid_pieces.clone();
            let change = change_signal.clone();
            playlist.changed.connect(move |t| {
                valid.store(false, Ordering::SeqCst);
                change.emit(&PlayerChange {
                    change: *t,
                    property: player_property::PLAYLIST,
                    frequent: false,
                });
            });
        }

        // Property changes invalidate only when they affect composition, but
        // are always re-announced with their type preserved.
        {
            let valid = have_valid_pieces.clone();
            let change = change_signal.clone();
            playlist.content_changed.connect(move |cc| {
                if property::affects_composition(cc.property) {
                    valid.store(false, Ordering::SeqCst);
                }
                change.emit(&PlayerChange {
                    change: cc.change,
                    property: cc.property,
                    frequent: cc.frequent,
                });
            });
        }

        let container = film.container;
        Self {
            film,
            playlist,
            pieces: Vec::new(),
            have_valid_pieces,
            container,
            black: Arc::new(image_ops::black(container)),
            approximate_size: false,
            always_burn_open_subtitles: false,
            ignore_video: false,
            ignore_audio: false,
            ignore_text: false,
            position: DcpTime::ZERO,
            stats: PlayerStatistics::default(),
            video_signal: Arc::new(Signal::new()),
            audio_signal: Arc::new(Signal::new()),
            text_signal: Arc::new(Signal::new()),
            change_signal,
        }
    }

    pub fn film(&self) -> &Film {
        &self.film
    }

    pub fn position(&self) -> DcpTime {
        self.position
    }

    pub fn statistics(&self) -> PlayerStatistics {
        self.stats
    }

    pub fn video_container_size(&self) -> Size {
        self.container
    }

    pub fn set_video_container_size(&mut self, size: Size) {
        if size == self.container {
            return;
        }
        self.change_signal.emit(&PlayerChange {
            change: ChangeType::Pending,
            property: player_property::VIDEO_CONTAINER_SIZE,
            frequent: false,
        });
        self.container = size;
        self.black = Arc::new(image_ops::black(size));
        self.change_signal.emit(&PlayerChange {
            change: ChangeType::Done,
            property: player_property::VIDEO_CONTAINER_SIZE,
            frequent: false,
        });
    }

    /// Round displayed image sizes down to multiples of 4 (cheaper scaling
    /// during preview).
    pub fn set_approximate_size(&mut self) {
        self.approximate_size = true;
    }

    pub fn set_always_burn_open_subtitles(&mut self) {
        self.always_burn_open_subtitles = true;
    }

    pub fn set_ignore_video(&mut self) {
        self.ignore_video = true;
    }

    pub fn set_ignore_audio(&mut self) {
        self.ignore_audio = true;
    }

    pub fn set_ignore_text(&mut self) {
        self.ignore_text = true;
    }

    /// Rebuild the piece list from the current playlist snapshot.
    fn setup_pieces(&mut self) -> PlaybackResult<()> {
        let content = self.playlist.content();
        let mut old_pieces: Vec<Piece> = std::mem::take(&mut self.pieces);
        debug!(items = content.len(), "rebuilding pieces");

        for c in &content {
            if !c.paths_valid() {
                continue;
            }

            let frc = if c.video.is_some() {
                c.frame_rate_change(&self.film)
            } else {
                best_overlap_frc(&content, c, &self.film)
            };

            let decoder: Box<dyn Decoder> = match &c.source {
                Source::Ffmpeg { .. } => Box::new(FfmpegDecoder::open(
                    c,
                    self.film.audio_frame_rate,
                    frc.speed_up(),
                )?),
                Source::ImageSequence => {
                    // Re-use an old decoder to keep its frame cache.
                    match old_pieces.iter().position(|p| p.decoder.reusable_for(c)) {
                        Some(i) => old_pieces.remove(i).decoder,
                        None => Box::new(ImageSequenceDecoder::open(c)?),
                    }
                }
                Source::Sound => Box::new(SoundDecoder::open(
                    c,
                    self.film.audio_frame_rate,
                    frc.speed_up(),
                )?),
                Source::SubRip => Box::new(SubRipDecoder::open(c)?),
                Source::Dcp { .. } => Box::new(DcpDecoder::open(c, self.film.audio_frame_rate)?),
            };

            self.pieces.push(Piece::new(c.clone(), decoder, frc));
        }

        self.have_valid_pieces.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_pieces(&mut self) -> PlaybackResult<()> {
        if self.have_valid_pieces.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.setup_pieces()
    }

    /// Seek the piece's decoder when the request is not sequential with the
    /// previous one.
    fn maybe_seek(&mut self, idx: usize, t: DcpTime, accurate: bool) -> PlaybackResult<()> {
        let film = self.film.clone();
        let window = DcpTime::from_frames(4, f64::from(film.video_frame_rate));
        let piece = &mut self.pieces[idx];
        let need = match piece.last_request {
            None => true,
            Some(last) => t < last || t > last + window,
        };
        if need {
            let target = piece.dcp_to_content_time(&film, t);
            piece.decoder.seek(target, accurate)?;
        }
        piece.last_request = Some(t);
        Ok(())
    }

    fn black_player_video(&self, time: DcpTime) -> PlayerVideo {
        PlayerVideo::new(
            ImageProxy::Memory(self.black.clone()),
            time,
            media::Eyes::Both,
            Crop::default(),
            self.container,
            self.container,
            None,
            Vec::new(),
        )
    }

    /// The composed frame at `time`: topmost overlapping video with subtitle
    /// overlays, or black when nothing overlaps.
    pub fn get_video(&mut self, time: DcpTime, accurate: bool) -> PlaybackResult<Arc<PlayerVideo>> {
        self.ensure_pieces()?;
        let film = self.film.clone();
        let period = DcpTimePeriod::new(time, time + film.one_video_frame());

        let video_idx = self
            .pieces
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                p.content.video.is_some() && p.period(&film).overlap(period).is_some()
            })
            .map(|(i, _)| i)
            .last();

        let Some(idx) = video_idx else {
            self.stats.video_black += 1;
            return Ok(Arc::new(self.black_player_video(time)));
        };

        let overlays = if self.ignore_text {
            Vec::new()
        } else {
            self.subtitle_overlays(time, &film)?
        };

        let frame = self.pieces[idx].dcp_to_content_video(&film, time);
        self.maybe_seek(idx, time, accurate)?;
        let decoded = {
            let piece = &mut self.pieces[idx];
            media::get_video(piece.decoder.as_mut(), frame, accurate)?
        };

        let Some(decoded) = decoded else {
            self.stats.video_black += 1;
            return Ok(Arc::new(self.black_player_video(time)));
        };
        self.stats.video_good += 1;

        let piece = &self.pieces[idx];
        let Some(video_part) = piece.content.video.as_ref() else {
            self.stats.video_black += 1;
            return Ok(Arc::new(self.black_player_video(time)));
        };
        let mut inter_size = video_part.scaled_size(self.container);
        if self.approximate_size {
            inter_size.width &= !3;
            inter_size.height &= !3;
        }

        Ok(Arc::new(PlayerVideo::new(
            decoded.image,
            time,
            decoded.eyes,
            video_part.crop,
            inter_size,
            self.container,
            video_part.colour_conversion.clone(),
            overlays,
        )))
    }

    fn subtitle_overlays(&mut self, time: DcpTime, film: &Film) -> PlaybackResult<Vec<Overlay>> {
        let period = DcpTimePeriod::new(time, time + film.one_video_frame());
        let container = self.container;
        let always_burn = self.always_burn_open_subtitles;
        let mut overlays = Vec::new();

        for idx in 0..self.pieces.len() {
            let part: Option<TextPart> = {
                let piece = &self.pieces[idx];
                if piece.period(film).overlap(period).is_none() {
                    None
                } else {
                    piece
                        .content
                        .active_texts(TextKind::OpenSubtitle)
                        .next()
                        .cloned()
                }
            };
            let Some(part) = part else {
                continue;
            };

            let from = self.pieces[idx].dcp_to_content_time(film, time);
            let to = from + ContentTime::from_dcp(film.one_video_frame(), &self.pieces[idx].frc);
            let content_period = ContentTimePeriod::new(from, to);

            self.maybe_seek(idx, time, true)?;
            let piece = &mut self.pieces[idx];

            // Image subtitles are always shown; text is rendered only when
            // burnt in.
            for bitmap in media::get_bitmap_subtitles(piece.decoder.as_mut(), content_period)? {
                if let Some(overlay) = subtitle_render::place_bitmap(&bitmap, &part, container) {
                    overlays.push(overlay);
                }
            }

            if part.burn || always_burn {
                for cue in media::get_string_subtitles(piece.decoder.as_mut(), content_period)? {
                    let fade = subtitle_render::fade_factor(&part, cue.period, from);
                    if let Some(overlay) =
                        subtitle_render::render_text(&cue, &part, container, fade)?
                    {
                        overlays.push(overlay);
                    }
                }
            }
        }

        Ok(overlays)
    }

    /// The composed audio covering `[time, time + length)`, silence where
    /// nothing overlaps.
    pub fn get_audio(
        &mut self,
        time: DcpTime,
        length: DcpTime,
        accurate: bool,
    ) -> PlaybackResult<AudioBuffers> {
        self.ensure_pieces()?;
        let film = self.film.clone();
        let frames = length.frames_round(f64::from(film.audio_frame_rate)) as usize;
        let mut out = AudioBuffers::new(film.audio_channels, frames);

        if self.ignore_audio {
            return Ok(out);
        }

        let period = DcpTimePeriod::new(time, time + length);
        let mut contributed = false;

        for idx in 0..self.pieces.len() {
            let overlapping = {
                let piece = &self.pieces[idx];
                piece.content.audio.is_some() && piece.period(&film).overlap(period).is_some()
            };
            if !overlapping {
                continue;
            }

            let content_frame = self.pieces[idx].dcp_to_resampled_audio(&film, time);
            self.maybe_seek(idx, time, accurate)?;

            let Some(part) = self.pieces[idx].content.audio.clone() else {
                continue;
            };
            let all = {
                let piece = &mut self.pieces[idx];
                media::get_audio(piece.decoder.as_mut(), content_frame, frames)?
            };
            let Some(mut all) = all else {
                continue;
            };
            if all.audio.frames() == 0 {
                continue;
            }

            if part.gain_db != 0.0 {
                all.audio.apply_gain(part.gain_db);
            }
            let mapped = remap(&all.audio, film.audio_channels, &part.mapping);

            let offset = all.frame - content_frame;
            if offset >= 0 {
                out.accumulate_frames(&mapped, 0, offset as usize, mapped.frames());
            } else {
                let skip = (-offset) as usize;
                out.accumulate_frames(&mapped, skip, 0, mapped.frames().saturating_sub(skip));
            }
            contributed = true;
        }

        if contributed {
            self.stats.audio_good += 1;
        } else {
            self.stats.audio_silent += 1;
        }
        Ok(out)
    }

    /// Emit one video frame (plus matching audio and captions) at the
    /// current position and advance.  Returns true at the end of the
    /// playlist.
    pub fn pass(&mut self) -> PlaybackResult<bool> {
        self.ensure_pieces()?;
        let film = self.film.clone();
        let length = self.playlist.length(&film);
        if self.position >= length {
            debug!(position = %self.position, "pass: end of playlist");
            return Ok(true);
        }

        let t = self.position;
        let one_frame = film.one_video_frame();

        if !self.ignore_video {
            let video = self.get_video(t, true)?;
            self.video_signal.emit(&(video, t));
        }

        if !self.ignore_audio {
            let audio = self.get_audio(t, one_frame, true)?;
            self.audio_signal
                .emit(&(audio, t, film.audio_frame_rate));
        }

        if !self.ignore_text {
            self.emit_closed_captions(t, &film)?;
        }

        self.position = t + one_frame;
        Ok(false)
    }

    fn emit_closed_captions(&mut self, t: DcpTime, film: &Film) -> PlaybackResult<()> {
        let period = DcpTimePeriod::new(t, t + film.one_video_frame());
        for idx in 0..self.pieces.len() {
            let part: Option<TextPart> = {
                let piece = &self.pieces[idx];
                if piece.period(film).overlap(period).is_none() {
                    None
                } else {
                    piece
                        .content
                        .active_texts(TextKind::ClosedCaption)
                        .next()
                        .cloned()
                }
            };
            let Some(part) = part else {
                continue;
            };

            let from = self.pieces[idx].dcp_to_content_time(film, t);
            let to = from + ContentTime::from_dcp(film.one_video_frame(), &self.pieces[idx].frc);
            let cues = {
                let piece = &mut self.pieces[idx];
                media::get_string_subtitles(
                    piece.decoder.as_mut(),
                    ContentTimePeriod::new(from, to),
                )?
            };
            if cues.is_empty() {
                continue;
            }
            self.text_signal.emit(&TextEvent {
                text: PlayerText {
                    strings: cues,
                    bitmaps: Vec::new(),
                },
                kind: TextKind::ClosedCaption,
                track: part.dcp_track.clone(),
                period,
            });
        }
        Ok(())
    }

    /// Reposition playback.  With `accurate` the next frames are exact for
    /// `time`; otherwise the nearest earlier frame boundary is used.
    pub fn seek(&mut self, time: DcpTime, accurate: bool) -> PlaybackResult<()> {
        self.ensure_pieces()?;
        let film = self.film.clone();
        let time = if accurate {
            time
        } else {
            time.floor_to_frame(f64::from(film.video_frame_rate))
        };
        debug!(to = %time, accurate, "player seek");

        for idx in 0..self.pieces.len() {
            let target = self.pieces[idx].dcp_to_content_time(&film, time);
            self.pieces[idx].decoder.seek(target, accurate)?;
            self.pieces[idx].last_request = Some(time);
        }
        self.position = time;
        Ok(())
    }
}

/// Frame-rate change for content with no video of its own: follow whatever
/// video it mostly plays alongside so resampling ratios stay stable.
fn best_overlap_frc(content: &[Content], item: &Content, film: &Film) -> FrameRateChange {
    let period = DcpTimePeriod::new(item.position, item.end(film));
    let mut best: Option<(DcpTime, f64)> = None;

    for other in content {
        let Some(video) = &other.video else {
            continue;
        };
        let other_period = DcpTimePeriod::new(other.position, other.end(film));
        let Some(overlap) = other_period.overlap(period) else {
            continue;
        };
        let duration = overlap.duration();
        if best.map(|(d, _)| duration > d).unwrap_or(true) {
            best = Some((duration, video.frame_rate));
        }
    }

    match best {
        Some((_, rate)) => FrameRateChange::new(rate, film.video_frame_rate),
        None => FrameRateChange::none(film.video_frame_rate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_playlist_yields_black_and_silence() {
        let film = Film::new("t");
        let container = film.container;
        let mut player = Player::new(film, Arc::new(Playlist::new()));

        let video = player.get_video(DcpTime::ZERO, true).unwrap();
        assert_eq!(video.time(), DcpTime::ZERO);
        assert_eq!(video.out_size(), container);

        let audio = player
            .get_audio(DcpTime::ZERO, DcpTime::from_seconds(0.5), true)
            .unwrap();
        assert_eq!(audio.channels(), 6);
        assert_eq!(audio.frames(), 24_000);
        for c in 0..audio.channels() {
            assert!(audio.channel(c).iter().all(|&s| s == 0.0));
        }

        // Nothing to play, so pass finishes immediately.
        assert!(player.pass().unwrap());
    }

    #[test]
    fn playlist_changes_invalidate_pieces_and_re_emit() {
        let film = Film::new("t");
        let playlist = Arc::new(Playlist::new());
        let player = Player::new(film, playlist.clone());

        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let s = seen.clone();
        player.change_signal.connect(move |c| {
            s.lock().unwrap().push((c.change, c.property));
        });

        playlist.add(Content::new(Source::ffmpeg(), vec![]));
        let events = seen.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                (ChangeType::Pending, player_property::PLAYLIST),
                (ChangeType::Done, player_property::PLAYLIST),
            ]
        );
        assert!(!player.have_valid_pieces.load(Ordering::SeqCst));
    }

    #[test]
    fn best_overlap_follows_the_longest_video() {
        let film = Film::new("t");
        let mut video_a = Content::new(Source::ffmpeg(), vec![]);
        video_a.video = Some(reelforge_state::content::VideoPart::new(
            25.0,
            250,
            Size::new(640, 480),
        ));
        video_a.length = ContentTime::from_seconds(10.0);

        let mut sound = Content::new(Source::Sound, vec![]);
        sound.length = ContentTime::from_seconds(5.0);
        sound.position = DcpTime::from_seconds(1.0);

        let frc = best_overlap_frc(&[video_a.clone(), sound.clone()], &sound, &film);
        assert_eq!(frc.source, 25.0);

        // With no video anywhere the film rate is used.
        let frc = best_overlap_frc(&[sound.clone()], &sound, &film);
        assert_eq!(frc.source, 24.0);
    }
}
