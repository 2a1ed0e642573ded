use std::path::Path;
use std::sync::Arc;

use ffmpeg::format::Pixel;
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{self, flag::Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg_the_third as ffmpeg;
use image::RgbaImage;
use reelforge_audio::AudioBuffers;
use reelforge_state::content::{Content, Source, VideoFrameType};
use reelforge_state::time::ContentTime;

use crate::decoder::{AudioBuffer, Decoder, TextBuffer, VideoBuffer};
use crate::error::{MediaError, MediaResult};
use crate::image_proxy::ImageProxy;
use crate::types::Eyes;

pub fn init_once() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        ffmpeg::init().expect("failed to initialize ffmpeg");
        unsafe {
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_FATAL);
        }
    });
}

struct ScalerState {
    ctx: scaling::Context,
    src_w: u32,
    src_h: u32,
    src_fmt: Pixel,
}

/// Decoder for anything ffmpeg can demux: the general movie-file path, and
/// (audio-only) the sound-file path.
pub struct FfmpegDecoder {
    frame_type: VideoFrameType,
    input: ffmpeg::format::context::Input,
    video_stream: Option<usize>,
    audio_stream: Option<usize>,
    video_decoder: Option<ffmpeg::decoder::Video>,
    audio_decoder: Option<ffmpeg::decoder::Audio>,
    scaler: Option<ScalerState>,
    video_time_base: f64,
    audio_time_base: f64,
    video_frame_rate: f64,
    /// PTS of the first video frame; containers do not always start at zero.
    first_video_seconds: Option<f64>,
    video_out: Option<VideoBuffer>,
    audio_out: Option<AudioBuffer>,
    flushed: bool,
}

impl FfmpegDecoder {
    pub fn open(content: &Content, dcp_audio_rate: i32, speed_up: f64) -> MediaResult<Self> {
        Self::open_path(
            content
                .paths
                .first()
                .ok_or_else(|| MediaError::unsupported("content has no path"))?,
            content,
            dcp_audio_rate,
            speed_up,
            false,
        )
    }

    /// Open with the video stream ignored; used for sound-file content.
    pub fn open_audio_only(
        content: &Content,
        dcp_audio_rate: i32,
        speed_up: f64,
    ) -> MediaResult<Self> {
        Self::open_path(
            content
                .paths
                .first()
                .ok_or_else(|| MediaError::unsupported("content has no path"))?,
            content,
            dcp_audio_rate,
            speed_up,
            true,
        )
    }

    /// Open a specific file, e.g. one asset of a DCP.
    pub fn open_path(
        path: &Path,
        content: &Content,
        dcp_audio_rate: i32,
        speed_up: f64,
        ignore_video: bool,
    ) -> MediaResult<Self> {
        init_once();

        let input = ffmpeg::format::input(path)?;

        let mut video_stream = None;
        let mut video_decoder = None;
        let mut video_time_base = 0.0;
        if !ignore_video && content.video.is_some() {
            if let Some(stream) = input.streams().best(Type::Video) {
                let tb = stream.time_base();
                video_time_base = f64::from(tb.numerator()) / f64::from(tb.denominator());
                let ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
                video_decoder = Some(ctx.decoder().video()?);
                video_stream = Some(stream.index());
            }
        }

        let wanted_audio = match &content.source {
            Source::Ffmpeg { audio_stream, .. } => *audio_stream,
            _ => None,
        };
        let mut audio_stream = None;
        let mut audio_decoder = None;
        let mut audio_time_base = 0.0;
        if content.audio.is_some() {
            let stream = match wanted_audio {
                Some(index) => input.streams().nth(index),
                None => input.streams().best(Type::Audio),
            };
            if let Some(stream) = stream {
                let tb = stream.time_base();
                audio_time_base = f64::from(tb.numerator()) / f64::from(tb.denominator());
                let ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
                audio_decoder = Some(ctx.decoder().audio()?);
                audio_stream = Some(stream.index());
            }
        }

        let first_video_seconds = match &content.source {
            Source::Ffmpeg {
                first_video: Some(fv),
                ..
            } => Some(fv.seconds()),
            _ => None,
        };

        let channels = content.audio.as_ref().map(|a| a.channels).unwrap_or(0);

        Ok(Self {
            frame_type: content
                .video
                .as_ref()
                .map(|v| v.frame_type)
                .unwrap_or_default(),
            input,
            video_stream,
            audio_stream,
            video_decoder,
            audio_decoder,
            scaler: None,
            video_time_base,
            audio_time_base,
            video_frame_rate: content.video.as_ref().map(|v| v.frame_rate).unwrap_or(24.0),
            first_video_seconds,
            video_out: video_stream.map(|_| VideoBuffer::new()),
            audio_out: audio_stream.map(|_| AudioBuffer::new(channels, dcp_audio_rate, speed_up)),
            flushed: false,
        })
    }

    fn ensure_scaler(&mut self, src_w: u32, src_h: u32, src_fmt: Pixel) -> MediaResult<()> {
        let needs_rebuild = match &self.scaler {
            Some(s) => s.src_w != src_w || s.src_h != src_h || s.src_fmt != src_fmt,
            None => true,
        };
        if needs_rebuild {
            let ctx = scaling::Context::get(
                src_fmt,
                src_w,
                src_h,
                Pixel::RGBA,
                src_w,
                src_h,
                ScaleFlags::BILINEAR,
            )?;
            self.scaler = Some(ScalerState {
                ctx,
                src_w,
                src_h,
                src_fmt,
            });
        }
        Ok(())
    }

    fn handle_video_frame(&mut self, frame: &VideoFrame) -> MediaResult<()> {
        let src_w = frame.width();
        let src_h = frame.height();
        if src_w == 0 || src_h == 0 {
            return Ok(());
        }

        let pts_seconds = frame.pts().map(|p| p as f64 * self.video_time_base);
        let first = match (self.first_video_seconds, pts_seconds) {
            (Some(f), _) => f,
            (None, Some(p)) => {
                self.first_video_seconds = Some(p);
                p
            }
            (None, None) => 0.0,
        };
        let frame_index = match pts_seconds {
            Some(p) => ((p - first) * self.video_frame_rate).round() as i64,
            None => 0,
        };

        self.ensure_scaler(src_w, src_h, frame.format())?;
        let scaler = self.scaler.as_mut().expect("scaler just built");
        let mut rgba_frame = VideoFrame::empty();
        scaler.ctx.run(frame, &mut rgba_frame)?;

        let stride = rgba_frame.stride(0);
        let data = rgba_frame.data(0);
        let mut pixels = Vec::with_capacity((src_w * src_h * 4) as usize);
        for y in 0..src_h as usize {
            let row_start = y * stride;
            let row_end = row_start + (src_w as usize * 4);
            if row_end <= data.len() {
                pixels.extend_from_slice(&data[row_start..row_end]);
            }
        }
        let Some(image) = RgbaImage::from_raw(src_w, src_h, pixels) else {
            return Ok(());
        };

        let out = self.video_out.as_mut().expect("video frame without buffer");
        match self.frame_type {
            VideoFrameType::TwoD => {
                out.emit(ImageProxy::Memory(Arc::new(image)), Eyes::Both, frame_index);
            }
            VideoFrameType::ThreeDLeftRight => {
                let half = src_w / 2;
                let left = image::imageops::crop_imm(&image, 0, 0, half, src_h).to_image();
                let right = image::imageops::crop_imm(&image, half, 0, half, src_h).to_image();
                out.emit(ImageProxy::Memory(Arc::new(left)), Eyes::Left, frame_index);
                out.emit(ImageProxy::Memory(Arc::new(right)), Eyes::Right, frame_index);
            }
            VideoFrameType::ThreeDTopBottom => {
                let half = src_h / 2;
                let top = image::imageops::crop_imm(&image, 0, 0, src_w, half).to_image();
                let bottom = image::imageops::crop_imm(&image, 0, half, src_w, half).to_image();
                out.emit(ImageProxy::Memory(Arc::new(top)), Eyes::Left, frame_index);
                out.emit(ImageProxy::Memory(Arc::new(bottom)), Eyes::Right, frame_index);
            }
        }
        Ok(())
    }

    fn handle_audio_frame(&mut self, frame: &ffmpeg::util::frame::Audio) {
        let Some(decoder) = self.audio_decoder.as_ref() else {
            return;
        };
        let rate = decoder.rate() as i32;
        let channels = decoder.ch_layout().channels() as usize;
        let pts_seconds = frame
            .pts()
            .map(|p| p as f64 * self.audio_time_base)
            .unwrap_or(0.0);

        let planar = extract_planar_f32(frame, channels);
        if let Some(out) = self.audio_out.as_mut() {
            out.emit(planar, pts_seconds, rate);
        }
    }

    fn drain_video(&mut self) -> MediaResult<()> {
        let mut frame = VideoFrame::empty();
        loop {
            let Some(decoder) = self.video_decoder.as_mut() else {
                return Ok(());
            };
            if decoder.receive_frame(&mut frame).is_err() {
                return Ok(());
            }
            self.handle_video_frame(&frame)?;
        }
    }

    fn drain_audio(&mut self) {
        let mut frame = ffmpeg::util::frame::Audio::empty();
        loop {
            let Some(decoder) = self.audio_decoder.as_mut() else {
                return;
            };
            if decoder.receive_frame(&mut frame).is_err() {
                return;
            }
            self.handle_audio_frame(&frame);
        }
    }

    fn flush(&mut self) -> MediaResult<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;
        if let Some(d) = self.video_decoder.as_mut() {
            let _ = d.send_eof();
        }
        if let Some(d) = self.audio_decoder.as_mut() {
            let _ = d.send_eof();
        }
        self.drain_video()?;
        self.drain_audio();
        Ok(())
    }
}

impl Decoder for FfmpegDecoder {
    fn pass(&mut self) -> MediaResult<bool> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {}
            Err(ffmpeg::Error::Eof) => {
                self.flush()?;
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        }

        if Some(packet.stream()) == self.video_stream {
            if let Some(decoder) = self.video_decoder.as_mut() {
                if decoder.send_packet(&packet).is_ok() {
                    self.drain_video()?;
                }
            }
        } else if Some(packet.stream()) == self.audio_stream {
            if let Some(decoder) = self.audio_decoder.as_mut() {
                if decoder.send_packet(&packet).is_ok() {
                    self.drain_audio();
                }
            }
        }

        Ok(false)
    }

    fn seek(&mut self, time: ContentTime, accurate: bool) -> MediaResult<()> {
        let ts = (time.seconds().max(0.0) * 1_000_000.0) as i64;
        if accurate {
            // Land on or before the target so frame-exact output can be
            // produced by decoding forward and discarding.
            self.input.seek(ts, ..ts)?;
        } else {
            self.input.seek(ts, ..)?;
        }
        if let Some(d) = self.video_decoder.as_mut() {
            d.flush();
        }
        if let Some(d) = self.audio_decoder.as_mut() {
            d.flush();
        }
        if let Some(b) = self.video_out.as_mut() {
            b.clear();
        }
        if let Some(b) = self.audio_out.as_mut() {
            b.clear();
        }
        self.flushed = false;
        Ok(())
    }

    fn video(&mut self) -> Option<&mut VideoBuffer> {
        self.video_out.as_mut()
    }

    fn audio(&mut self) -> Option<&mut AudioBuffer> {
        self.audio_out.as_mut()
    }

    fn text(&mut self) -> Option<&mut TextBuffer> {
        None
    }
}

fn extract_planar_f32(
    frame: &ffmpeg::util::frame::Audio,
    channels: usize,
) -> AudioBuffers {
    use ffmpeg::format::Sample;

    let sample_count = frame.samples();
    let is_planar = !frame.is_packed();
    let mut out = AudioBuffers::new(channels.max(1), sample_count);

    match (frame.format(), is_planar) {
        (Sample::F32(_), false) => {
            let data = frame.data(0);
            for ch in 0..channels {
                let dst = out.channel_mut(ch);
                for (i, d) in dst.iter_mut().enumerate() {
                    let offset = (i * channels + ch) * 4;
                    if offset + 4 <= data.len() {
                        *d = f32::from_le_bytes([
                            data[offset],
                            data[offset + 1],
                            data[offset + 2],
                            data[offset + 3],
                        ]);
                    }
                }
            }
        }
        (Sample::F32(_), true) => {
            for ch in 0..channels.min(frame.planes()) {
                let plane = frame.data(ch);
                let dst = out.channel_mut(ch);
                for (i, d) in dst.iter_mut().enumerate() {
                    let offset = i * 4;
                    if offset + 4 <= plane.len() {
                        *d = f32::from_le_bytes([
                            plane[offset],
                            plane[offset + 1],
                            plane[offset + 2],
                            plane[offset + 3],
                        ]);
                    }
                }
            }
        }
        (Sample::I16(_), false) => {
            let data = frame.data(0);
            for ch in 0..channels {
                let dst = out.channel_mut(ch);
                for (i, d) in dst.iter_mut().enumerate() {
                    let offset = (i * channels + ch) * 2;
                    if offset + 2 <= data.len() {
                        let s = i16::from_le_bytes([data[offset], data[offset + 1]]);
                        *d = f32::from(s) / 32768.0;
                    }
                }
            }
        }
        (Sample::I16(_), true) => {
            for ch in 0..channels.min(frame.planes()) {
                let plane = frame.data(ch);
                let dst = out.channel_mut(ch);
                for (i, d) in dst.iter_mut().enumerate() {
                    let offset = i * 2;
                    if offset + 2 <= plane.len() {
                        let s = i16::from_le_bytes([plane[offset], plane[offset + 1]]);
                        *d = f32::from(s) / 32768.0;
                    }
                }
            }
        }
        _ => {
            // Unhandled sample formats come through as silence.
        }
    }

    out
}
