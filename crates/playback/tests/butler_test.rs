//! Butler behaviour: readahead, ordering, seeks, suspension and errors.

mod support;

use std::time::{Duration, Instant};

use reelforge_audio::{AudioBuffers, AudioMapping};
use reelforge_playback::{
    Butler, ButlerError, Player, Projection, MAXIMUM_VIDEO_READAHEAD, MINIMUM_VIDEO_READAHEAD,
};
use reelforge_state::change::ChangeType;
use reelforge_state::content::{property, Content, Source};
use reelforge_state::time::DcpTime;
use reelforge_state::TextKind;

use support::*;

fn butler_for(player: Player) -> Butler {
    Butler::new(
        player,
        AudioMapping::identity(6),
        6,
        Projection::default(),
    )
}

fn wait_until(timeout: Duration, mut f: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn fills_readahead_without_consumers() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 30.0)]);
    let butler = butler_for(Player::new(film(), playlist));

    assert!(
        wait_until(Duration::from_secs(10), || butler.video_queue_size()
            >= MINIMUM_VIDEO_READAHEAD),
        "butler never reached the minimum readahead"
    );
    assert!(butler.memory_used() > 0);
    assert!(butler.video_queue_size() <= MAXIMUM_VIDEO_READAHEAD);
}

#[test]
fn video_times_are_non_decreasing() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 5.0)]);
    let butler = butler_for(Player::new(film(), playlist));

    let mut last = None;
    for _ in 0..30 {
        let (_, t) = butler.get_video().unwrap();
        if let Some(last) = last {
            assert!(t >= last, "time went backwards: {t} < {last}");
        }
        last = Some(t);
    }
}

#[test]
fn seek_discards_queued_frames_and_restarts_at_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 30.0)]);
    let butler = butler_for(Player::new(film(), playlist));

    let (_, first) = butler.get_video().unwrap();
    assert_eq!(first, DcpTime::ZERO);

    let target = DcpTime::from_seconds(5.0);
    butler.seek(target, true);
    let (_, t) = butler.get_video().unwrap();
    assert_eq!(t, target);

    // Seeking to the same place again reproduces the same first frame.
    butler.seek(target, true);
    let (_, t) = butler.get_video().unwrap();
    assert_eq!(t, target);
}

#[test]
fn suspension_returns_again_until_the_change_is_done() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 10.0)]);
    let player = Player::new(film(), playlist);
    let change = player.change_signal.clone();
    let butler = butler_for(player);

    change.emit(&reelforge_playback::PlayerChange {
        change: ChangeType::Pending,
        property: property::POSITION,
        frequent: true,
    });
    assert!(butler.suspended());
    assert_eq!(butler.get_video().unwrap_err(), ButlerError::Again);

    change.emit(&reelforge_playback::PlayerChange {
        change: ChangeType::Done,
        property: property::POSITION,
        frequent: true,
    });
    assert!(!butler.suspended());
    assert!(butler.get_video().is_ok());
}

#[test]
fn non_frequent_change_reseeks_to_the_buffered_head() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 30.0)]);
    let player = Player::new(film(), playlist);
    let change = player.change_signal.clone();
    let butler = butler_for(player);

    let (_, t0) = butler.get_video().unwrap();
    let head = t0 + film().one_video_frame();

    change.emit(&reelforge_playback::PlayerChange {
        change: ChangeType::Pending,
        property: property::POSITION,
        frequent: false,
    });
    change.emit(&reelforge_playback::PlayerChange {
        change: ChangeType::Done,
        property: property::POSITION,
        frequent: false,
    });

    // The queues were flushed and refilled from where they were; nothing
    // rendered before the change slips through.
    let (_, t) = butler.get_video().unwrap();
    assert_eq!(t, head);
}

#[test]
fn encrypted_dcp_without_kdm_surfaces_as_death() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = Content::new(
        Source::Dcp {
            name: "Enc".to_string(),
            encrypted: true,
            kdm: None,
            kdm_valid: false,
            has_subtitles: false,
            reference_video: false,
            reference_audio: false,
            reference_text: false,
        },
        vec![dir.path().to_path_buf()],
    );
    c.length = reelforge_state::ContentTime::from_seconds(10.0);
    assert!(!c.can_be_played());

    let playlist = playlist_of(vec![c]);
    let butler = butler_for(Player::new(film(), playlist));

    match butler.get_video() {
        Err(ButlerError::Dead(msg)) => assert!(msg.contains("DCP"), "unexpected message: {msg}"),
        other => panic!("expected death, got {other:?}"),
    }
}

#[test]
fn queued_frames_are_delivered_before_a_later_death() {
    let dir = tempfile::tempdir().unwrap();
    let first = still_video_content(dir.path(), "ok", 2.0);
    let mut second = still_video_content(dir.path(), "gone", 2.0);
    second.position = DcpTime::from_seconds(3.0);
    let second_path = second.paths[0].clone();
    let playlist = playlist_of(vec![first, second]);
    let butler = butler_for(Player::new(film(), playlist));

    // Let the driver build its pieces and queue some readahead, then pull
    // the second content's file out from under it.  The readahead cap keeps
    // the driver well short of the second content until we start consuming.
    assert!(wait_until(Duration::from_secs(10), || butler.video_queue_size()
        >= MINIMUM_VIDEO_READAHEAD));
    std::fs::remove_file(&second_path).unwrap();

    // Everything decoded before the failure is still delivered, in order;
    // only then does the stored error surface.
    let mut frames = 0;
    let mut last = None;
    let death = loop {
        match butler.get_video() {
            Ok((_, t)) => {
                if let Some(last) = last {
                    assert!(t >= last, "time went backwards: {t} < {last}");
                }
                last = Some(t);
                frames += 1;
            }
            Err(e) => break e,
        }
    };
    assert!(
        matches!(death, ButlerError::Dead(_)),
        "expected death, got {death:?}"
    );
    // The first content plus the black gap: frames 0..72 at 24 fps.
    assert_eq!(frames, 72);
}

#[test]
fn end_of_stream_is_finished_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 1.0)]);
    let butler = butler_for(Player::new(film(), playlist));

    let mut frames = 0;
    loop {
        match butler.get_video() {
            Ok(_) => frames += 1,
            Err(ButlerError::Finished) => break,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(frames, 24);
    assert!(butler.rethrow().is_ok());
}

#[test]
fn audio_is_delivered_with_timestamps_and_silence_padding() {
    let dir = tempfile::tempdir().unwrap();
    let mut to_channel_0 = AudioMapping::new(1, 6);
    to_channel_0.set(0, 0, 1.0);
    let playlist = playlist_of(vec![constant_wav_content(
        dir.path(),
        "a",
        1.0,
        0.5,
        to_channel_0,
    )]);
    let butler = butler_for(Player::new(film(), playlist));

    assert!(wait_until(Duration::from_secs(10), || {
        butler.video_queue_size() > 0
    }));

    let mut out = AudioBuffers::new(6, 0);
    let t = loop {
        if let Some(t) = butler.get_audio(&mut out, 2000).unwrap() {
            break t;
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    assert_eq!(t, DcpTime::ZERO);
    assert!((out.channel(0)[0] - 0.5).abs() < 1e-3);

    let t = butler.get_audio(&mut out, 2000).unwrap().unwrap();
    assert_eq!(t, DcpTime::from_frames(2000, 48_000.0));
}

#[test]
fn closed_captions_are_queued_for_polling() {
    let dir = tempfile::tempdir().unwrap();
    let video = still_video_content(dir.path(), "v", 4.0);
    let captions = subrip_content(
        dir.path(),
        "cc",
        &[(0.5, 2.0, "caption text")],
        TextKind::ClosedCaption,
    );
    let playlist = playlist_of(vec![video, captions]);
    let butler = butler_for(Player::new(film(), playlist));

    assert!(
        wait_until(Duration::from_secs(10), || butler
            .get_closed_caption()
            .map(|c| {
                assert!(!c.text.strings.is_empty());
                assert_eq!(c.text.strings[0].lines[0].text, "caption text");
            })
            .is_some()),
        "no closed caption arrived"
    );
}
