//! Concurrent driver between the Player and its consumers.
//!
//! One background thread fills bounded video/audio/caption queues by calling
//! `Player::pass`; a pool of prepare workers does the expensive per-frame
//! work ahead of consumption.  Consumers pull with `get_video` / `get_audio`
//! / `get_closed_caption`.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use reelforge_audio::{remap, AudioBuffers, AudioMapping};
use reelforge_state::change::ChangeType;
use reelforge_state::content::TextKind;
use reelforge_state::time::DcpTime;
use tracing::{debug, error, warn};

use crate::error::{ButlerError, PlaybackError};
use crate::player::{Player, PlayerChange};
use crate::player_video::{PlayerVideo, Projection};
use crate::prepare_pool::PreparePool;
use crate::ring_buffers::{AudioRingBuffer, Caption, TextRingBuffer, VideoRingBuffer};

/// Minimum video readahead in frames.
pub const MINIMUM_VIDEO_READAHEAD: usize = 10;
/// Maximum video readahead in frames; only exceeded (by much) if the Player
/// misbehaves.
pub const MAXIMUM_VIDEO_READAHEAD: usize = 48;
/// Minimum audio readahead in frames at 48 kHz.
pub const MINIMUM_AUDIO_READAHEAD: usize = 48_000 * MINIMUM_VIDEO_READAHEAD / 24;
/// Maximum audio readahead in frames at 48 kHz.
pub const MAXIMUM_AUDIO_READAHEAD: usize = 48_000 * MAXIMUM_VIDEO_READAHEAD / 24;

struct State {
    suspended: i32,
    finished: bool,
    died: bool,
    stop: bool,
    pending_seek: Option<(DcpTime, bool)>,
    /// Target of a change-triggered reseek whose buffers have not refilled
    /// yet; repeated drags coalesce onto this.
    awaiting: Option<DcpTime>,
    disable_audio: bool,
    error: Option<PlaybackError>,
}

struct Buffers {
    video: VideoRingBuffer,
    audio: AudioRingBuffer,
    captions: TextRingBuffer,
}

struct Inner {
    /// Guards `State`.  Never held across `Player::pass`.
    state: Mutex<State>,
    /// Guards the ring buffers.  Acquired strictly after `state` when both
    /// are needed.
    buffers: Mutex<Buffers>,
    /// Consumers block here for data.
    arrived: Condvar,
    /// The driver blocks here for work.
    summon: Condvar,
}

impl Inner {
    fn store_error(&self, e: PlaybackError) {
        error!("playback died: {e}");
        let mut state = self.state.lock().unwrap();
        if state.error.is_none() {
            state.error = Some(e);
        }
        state.died = true;
        drop(state);
        self.arrived.notify_all();
    }

    /// Whether the driver should call `pass`.  Caller holds the state lock.
    fn should_run(&self, state: &State) -> Result<bool, PlaybackError> {
        let (video, audio) = {
            let buffers = self.buffers.lock().unwrap();
            (buffers.video.size(), buffers.audio.size())
        };

        if video >= MAXIMUM_VIDEO_READAHEAD * 10 {
            return Err(PlaybackError::programming(format!(
                "video buffers reached {video} frames (audio is {audio})"
            )));
        }
        if audio >= MAXIMUM_AUDIO_READAHEAD * 10 {
            return Err(PlaybackError::programming(format!(
                "audio buffers reached {audio} frames (video is {video})"
            )));
        }
        if video >= MAXIMUM_VIDEO_READAHEAD * 2 {
            warn!("video buffers reached {video} frames (audio is {audio})");
        }
        if audio >= MAXIMUM_AUDIO_READAHEAD * 2 {
            warn!("audio buffers reached {audio} frames (video is {video})");
        }

        if state.stop || state.finished || state.died || state.suspended > 0 {
            return Ok(false);
        }

        if video < MINIMUM_VIDEO_READAHEAD
            || (!state.disable_audio && audio < MINIMUM_AUDIO_READAHEAD)
        {
            // We definitely need more data.
            return Ok(true);
        }

        // Keep going until full.
        Ok(video < MAXIMUM_VIDEO_READAHEAD && audio < MAXIMUM_AUDIO_READAHEAD)
    }

    /// Caller holds the state lock.
    fn seek_unlocked(&self, state: &mut State, position: DcpTime, accurate: bool) {
        if state.died {
            return;
        }
        state.finished = false;
        state.pending_seek = Some((position, accurate));
        {
            let mut buffers = self.buffers.lock().unwrap();
            buffers.video.clear();
            buffers.audio.clear();
            buffers.captions.clear();
        }
        self.summon.notify_all();
    }

    fn player_change(&self, c: &PlayerChange) {
        let mut state = self.state.lock().unwrap();
        match c.change {
            ChangeType::Pending => {
                state.suspended += 1;
            }
            ChangeType::Cancelled => {
                state.suspended -= 1;
            }
            ChangeType::Done => {
                state.suspended -= 1;
                if state.died || state.pending_seek.is_some() || c.frequent {
                    drop(state);
                    self.summon.notify_all();
                    return;
                }

                // Frames already queued were rendered with the old settings;
                // go back to where the buffers were and refill.  If we are
                // still waiting for a previous change-seek to refill, keep
                // aiming at the same place.
                let next = {
                    let mut buffers = self.buffers.lock().unwrap();
                    buffers.video.get().map(|(_, t)| t)
                };
                let seek_to = match (state.awaiting, next) {
                    (Some(awaiting), Some(next)) if awaiting > next => Some(awaiting),
                    (_, Some(next)) => Some(next),
                    (Some(awaiting), None) => Some(awaiting),
                    (None, None) => None,
                };
                if let Some(to) = seek_to {
                    self.seek_unlocked(&mut state, to, true);
                    state.awaiting = Some(to);
                }
            }
        }
        drop(state);
        self.summon.notify_all();
    }
}

/// The buffered, back-pressured producer in front of a [`Player`].
pub struct Butler {
    inner: Arc<Inner>,
    driver: Option<JoinHandle<()>>,
    pool: Option<PreparePool>,
    audio_channels: usize,
}

impl Butler {
    /// Takes ownership of the player; it runs on the Butler's thread from
    /// here on.  `projection` is used to prepare frames so that consumers'
    /// `image` calls are quick.
    pub fn new(
        player: Player,
        audio_mapping: AudioMapping,
        audio_channels: usize,
        projection: Projection,
    ) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                suspended: 0,
                finished: false,
                died: false,
                stop: false,
                pending_seek: None,
                awaiting: None,
                disable_audio: false,
                error: None,
            }),
            buffers: Mutex::new(Buffers {
                video: VideoRingBuffer::new(),
                audio: AudioRingBuffer::new(),
                captions: TextRingBuffer::new(),
            }),
            arrived: Condvar::new(),
            summon: Condvar::new(),
        });

        let pool = PreparePool::with_default_size();

        // The butler must hear about changes first, otherwise it might not
        // sort out suspensions before get_video is called in response.
        {
            let weak = Arc::downgrade(&inner);
            player.change_signal.connect_front(move |c| {
                if let Some(inner) = weak.upgrade() {
                    inner.player_change(c);
                }
            });
        }

        {
            let weak = Arc::downgrade(&inner);
            let pool_tx = pool.sender();
            player.video_signal.connect(move |(video, time)| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let state = inner.state.lock().unwrap();
                if state.pending_seek.is_some() {
                    // A seek is about to discard everything; do not store.
                    return;
                }

                let weak_video = Arc::downgrade(video);
                let weak_inner = Arc::downgrade(&inner);
                let _ = pool_tx.send(Box::new(move || {
                    // If the frame is gone the consumer already took it
                    // without waiting for preparation.
                    let Some(video) = weak_video.upgrade() else {
                        return;
                    };
                    if let Err(e) = video.prepare(projection) {
                        if let Some(inner) = weak_inner.upgrade() {
                            inner.store_error(e);
                        }
                    }
                }));

                let mut buffers = inner.buffers.lock().unwrap();
                buffers.video.put(video.clone(), *time);
                drop(buffers);
                drop(state);
            });
        }

        {
            let weak = Arc::downgrade(&inner);
            let mapping = audio_mapping.clone();
            player.audio_signal.connect(move |(audio, time, rate)| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let state = inner.state.lock().unwrap();
                if state.pending_seek.is_some() || state.disable_audio {
                    return;
                }
                let remapped = remap(audio, audio_channels, &mapping);
                let mut buffers = inner.buffers.lock().unwrap();
                buffers.audio.put(remapped, *time, *rate);
                drop(buffers);
                drop(state);
            });
        }

        {
            let weak = Arc::downgrade(&inner);
            player.text_signal.connect(move |event| {
                if event.kind != TextKind::ClosedCaption {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let mut buffers = inner.buffers.lock().unwrap();
                buffers.captions.put(Caption {
                    text: event.text.clone(),
                    track: event.track.clone(),
                    period: event.period,
                });
            });
        }

        let driver = {
            let inner = inner.clone();
            std::thread::Builder::new()
                .name("butler".to_string())
                .spawn(move || drive(inner, player))
                .expect("failed to spawn butler thread")
        };

        Self {
            inner,
            driver: Some(driver),
            pool: Some(pool),
            audio_channels,
        }
    }

    /// Next prepared frame, blocking until one is available.
    ///
    /// Returns `Again` while a change is settling, `Finished` at end of
    /// stream and `Dead` if playback hit an error.
    pub fn get_video(&self) -> Result<(Arc<PlayerVideo>, DcpTime), ButlerError> {
        let mut state = self.inner.state.lock().unwrap();
        if state.suspended > 0 {
            return Err(ButlerError::Again);
        }

        loop {
            // Frames decoded before a failure are still good; drain them
            // before surfacing death.
            let head = {
                let mut buffers = self.inner.buffers.lock().unwrap();
                buffers.video.get()
            };
            if let Some(frame) = head {
                drop(state);
                self.inner.summon.notify_all();
                return Ok(frame);
            }
            if let Some(e) = state.error.take() {
                return Err(ButlerError::Dead(e.to_string()));
            }
            if state.finished {
                return Err(ButlerError::Finished);
            }
            if state.died {
                return Err(ButlerError::Dead("playback died".to_string()));
            }
            state = self.inner.arrived.wait(state).unwrap();
        }
    }

    /// Copy up to `frames` frames of audio into `out`, silence-filling any
    /// shortfall.  Returns the time of the first populated frame, or None on
    /// a complete underrun.
    pub fn get_audio(
        &self,
        out: &mut AudioBuffers,
        frames: usize,
    ) -> Result<Option<DcpTime>, ButlerError> {
        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(e) = state.error.take() {
                return Err(ButlerError::Dead(e.to_string()));
            }
        }
        let time = {
            let mut buffers = self.inner.buffers.lock().unwrap();
            buffers.audio.get(out, frames)
        };
        self.inner.summon.notify_all();
        Ok(time)
    }

    /// Next closed-caption cue, if one is queued.  Never blocks.
    pub fn get_closed_caption(&self) -> Option<Caption> {
        let mut buffers = self.inner.buffers.lock().unwrap();
        buffers.captions.get()
    }

    pub fn seek(&self, position: DcpTime, accurate: bool) {
        let mut state = self.inner.state.lock().unwrap();
        state.awaiting = None;
        self.inner.seek_unlocked(&mut state, position, accurate);
    }

    pub fn disable_audio(&self) {
        self.inner.state.lock().unwrap().disable_audio = true;
    }

    /// True while a change is settling and `get_video` would return `Again`.
    pub fn suspended(&self) -> bool {
        self.inner.state.lock().unwrap().suspended > 0
    }

    /// Bytes held by queued video frames.
    pub fn memory_used(&self) -> usize {
        self.inner.buffers.lock().unwrap().video.memory_used()
    }

    /// Frames currently queued, for diagnostics.
    pub fn video_queue_size(&self) -> usize {
        self.inner.buffers.lock().unwrap().video.size()
    }

    pub fn audio_channels(&self) -> usize {
        self.audio_channels
    }

    /// Re-raise any error stored by the driver or a prepare worker.
    pub fn rethrow(&self) -> Result<(), ButlerError> {
        let mut state = self.inner.state.lock().unwrap();
        match state.error.take() {
            Some(e) => Err(ButlerError::Dead(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for Butler {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.stop = true;
        }
        self.inner.summon.notify_all();
        if let Some(driver) = self.driver.take() {
            let _ = driver.join();
        }
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

fn drive(inner: Arc<Inner>, mut player: Player) {
    debug!("butler thread starting");
    loop {
        let mut state = inner.state.lock().unwrap();

        // Wait until we have something to do.
        loop {
            if state.stop {
                state.finished = true;
                drop(state);
                inner.arrived.notify_all();
                return;
            }
            if state.pending_seek.is_some() {
                break;
            }
            match inner.should_run(&state) {
                Ok(true) => break,
                Ok(false) => state = inner.summon.wait(state).unwrap(),
                Err(e) => {
                    drop(state);
                    inner.store_error(e);
                    return;
                }
            }
        }

        // Apply any requested seek.
        if let Some((position, accurate)) = state.pending_seek.take() {
            state.finished = false;
            drop(state);
            debug!(to = %position, accurate, "applying seek");
            if let Err(e) = player.seek(position, accurate) {
                inner.store_error(e);
                return;
            }
            state = inner.state.lock().unwrap();
        }

        // Fill the buffers.  Stop if a seek appears while the lock is
        // released, since nothing would be stored anyway.
        loop {
            if state.stop || state.pending_seek.is_some() {
                break;
            }
            match inner.should_run(&state) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    drop(state);
                    inner.store_error(e);
                    return;
                }
            }

            drop(state);
            match player.pass() {
                Ok(true) => {
                    state = inner.state.lock().unwrap();
                    state.finished = true;
                    inner.arrived.notify_all();
                    break;
                }
                Ok(false) => {
                    inner.arrived.notify_all();
                    state = inner.state.lock().unwrap();
                }
                Err(e) => {
                    inner.store_error(e);
                    return;
                }
            }
        }
    }
}
