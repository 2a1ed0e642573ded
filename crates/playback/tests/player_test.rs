//! Player composition against small synthetic projects.

mod support;

use std::sync::{Arc, Mutex};

use reelforge_audio::AudioMapping;
use reelforge_media::Eyes;
use reelforge_playback::{Player, Projection};
use reelforge_state::time::{ContentTime, DcpTime};
use reelforge_state::TextKind;

use support::*;

#[test]
fn video_frame_carries_the_requested_time() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "a", 10.0)]);
    let mut player = Player::new(film(), playlist);

    let t = DcpTime::from_seconds(5.0);
    let video = player.get_video(t, true).unwrap();
    assert_eq!(video.time(), t);
    assert_eq!(video.eyes(), Eyes::Both);

    // The content is visible, so the centre is not black.
    let img = video.image(Projection::default()).unwrap();
    let centre = img.get_pixel(img.width() / 2, img.height() / 2);
    assert_eq!(centre, &image::Rgba([200, 40, 40, 255]));
}

#[test]
fn gaps_between_content_are_black_frames_of_container_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut late = still_video_content(dir.path(), "late", 2.0);
    late.position = DcpTime::from_seconds(5.0);
    let playlist = playlist_of(vec![late]);
    let mut player = Player::new(film(), playlist);

    let video = player.get_video(DcpTime::from_seconds(1.0), true).unwrap();
    assert_eq!(video.time(), DcpTime::from_seconds(1.0));
    assert_eq!(video.out_size(), film().container);
    let img = video.image(Projection::default()).unwrap();
    assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));

    // Inside the content it is not black any more.
    let video = player.get_video(DcpTime::from_seconds(6.0), true).unwrap();
    let img = video.image(Projection::default()).unwrap();
    assert!(img.pixels().any(|p| p.0 != [0, 0, 0, 255]));
}

#[test]
fn overlapping_audio_sums_into_mapped_channels() {
    let dir = tempfile::tempdir().unwrap();

    let mut to_channel_0 = AudioMapping::new(1, 6);
    to_channel_0.set(0, 0, 1.0);

    let a = constant_wav_content(dir.path(), "a", 4.0, 0.25, to_channel_0.clone());
    let b = constant_wav_content(dir.path(), "b", 4.0, 0.5, to_channel_0);
    let playlist = playlist_of(vec![a, b]);
    let mut player = Player::new(film(), playlist);

    let audio = player
        .get_audio(DcpTime::from_seconds(2.0), film().one_video_frame(), true)
        .unwrap();
    assert_eq!(audio.channels(), 6);
    assert_eq!(audio.frames(), 2000);

    // Both sources land in channel 0 and sum; the rest stay silent.
    assert!((audio.channel(0)[0] - 0.75).abs() < 1e-3);
    for c in 1..6 {
        assert!(audio.channel(c).iter().all(|&s| s == 0.0));
    }
}

#[test]
fn audio_mapped_only_to_one_channel_leaves_the_rest_zero() {
    let dir = tempfile::tempdir().unwrap();
    let mut to_channel_2 = AudioMapping::new(1, 6);
    to_channel_2.set(0, 2, 1.0);

    let playlist = playlist_of(vec![constant_wav_content(
        dir.path(),
        "only2",
        2.0,
        0.5,
        to_channel_2,
    )]);
    let mut player = Player::new(film(), playlist);

    let audio = player
        .get_audio(DcpTime::from_seconds(1.0), film().one_video_frame(), true)
        .unwrap();
    assert!((audio.channel(2)[100] - 0.5).abs() < 1e-3);
    for c in [0, 1, 3, 4, 5] {
        assert!(audio.channel(c).iter().all(|&s| s == 0.0));
    }
}

#[test]
fn trim_start_shifts_content_into_the_timeline() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = still_video_content(dir.path(), "t", 10.0);
    c.trim_start = ContentTime::from_seconds(2.0);
    let playlist = playlist_of(vec![c]);
    let mut player = Player::new(film(), playlist);

    // 10s of content trimmed by 2s covers 8s of timeline.
    let video = player.get_video(DcpTime::from_seconds(7.9), true).unwrap();
    let img = video.image(Projection::default()).unwrap();
    assert!(img.pixels().any(|p| p.0 != [0, 0, 0, 255]));

    let video = player.get_video(DcpTime::from_seconds(8.5), true).unwrap();
    let img = video.image(Projection::default()).unwrap();
    assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 255]));
}

#[test]
fn burnt_subtitles_change_the_frame() {
    let dir = tempfile::tempdir().unwrap();
    let video = still_video_content(dir.path(), "v", 6.0);
    let subs = subrip_content(
        dir.path(),
        "s",
        &[(1.0, 3.0, "HELLO")],
        TextKind::OpenSubtitle,
    );
    let playlist = playlist_of(vec![video, subs]);
    let mut player = Player::new(film(), playlist);
    player.set_always_burn_open_subtitles();

    let with = player.get_video(DcpTime::from_seconds(2.0), true).unwrap();
    let with = with.image(Projection::default()).unwrap();
    let without = player.get_video(DcpTime::from_seconds(4.0), true).unwrap();
    let without = without.image(Projection::default()).unwrap();

    // Frames inside and outside the cue render; whether glyphs actually
    // appear depends on the fonts available, so only sizes are asserted.
    assert_eq!(with.dimensions(), without.dimensions());
}

#[test]
fn pass_interleaves_video_and_audio_and_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let mut to_channel_0 = AudioMapping::new(1, 6);
    to_channel_0.set(0, 0, 1.0);

    let playlist = playlist_of(vec![
        still_video_content(dir.path(), "v", 1.0),
        constant_wav_content(dir.path(), "a", 1.0, 0.25, to_channel_0),
    ]);
    let mut player = Player::new(film(), playlist);

    let video_frames = Arc::new(Mutex::new(0u64));
    let audio_frames = Arc::new(Mutex::new(0u64));
    {
        let v = video_frames.clone();
        player.video_signal.connect(move |_| {
            *v.lock().unwrap() += 1;
        });
        let a = audio_frames.clone();
        player.audio_signal.connect(move |(buffers, _, _)| {
            *a.lock().unwrap() += buffers.frames() as u64;
        });
    }

    let mut passes = 0;
    while !player.pass().unwrap() {
        passes += 1;
        assert!(passes < 100, "pass never finished");
        // Audio keeps up with video: one frame of each per pass.
        let v = *video_frames.lock().unwrap();
        let a = *audio_frames.lock().unwrap();
        assert_eq!(a, v * 2000);
    }
    assert_eq!(*video_frames.lock().unwrap(), 24);
}

#[test]
fn seek_then_first_video_is_at_the_target() {
    let dir = tempfile::tempdir().unwrap();
    let playlist = playlist_of(vec![still_video_content(dir.path(), "v", 10.0)]);
    let mut player = Player::new(film(), playlist);

    let got = Arc::new(Mutex::new(Vec::new()));
    {
        let g = got.clone();
        player.video_signal.connect(move |(_, t)| {
            g.lock().unwrap().push(*t);
        });
    }

    player.seek(DcpTime::from_seconds(5.0), true).unwrap();
    player.pass().unwrap();
    player.pass().unwrap();

    let times = got.lock().unwrap().clone();
    assert_eq!(times[0], DcpTime::from_seconds(5.0));
    assert!(times[1] > times[0]);

    // Seeking again to the same place reproduces the same first frame time.
    got.lock().unwrap().clear();
    player.seek(DcpTime::from_seconds(5.0), true).unwrap();
    player.pass().unwrap();
    assert_eq!(got.lock().unwrap()[0], DcpTime::from_seconds(5.0));
}
