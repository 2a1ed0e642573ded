//! Playlist project-file persistence.
//!
//! Current files are written at `CURRENT_VERSION`; the loader additionally
//! accepts the older tag names used by project files from versions 7-36
//! (e.g. `SubtitleXOffset` for `XOffset`, text fields inline on the content
//! element rather than in a `<Text>` sub-tree).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::debug;

use crate::content::{
    AudioPart, Colour, Content, ContentId, FfmpegColour, Font, Source, TextEffect, TextKind,
    TextPart, VideoFrameType, VideoPart, VideoScale,
};
use crate::geometry::{Crop, Size};
use crate::playlist::Playlist;
use crate::time::ContentTime;
use crate::time::DcpTime;

pub const CURRENT_VERSION: u32 = 37;

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed playlist file: {0}")]
    Malformed(String),
}

fn malformed(what: impl Into<String>) -> XmlError {
    XmlError::Malformed(what.into())
}

/// Minimal owned tree; project and subtitle files are small so a DOM keeps
/// version-dependent lookups straightforward.
#[derive(Debug, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn string_child(&self, name: &str) -> Option<String> {
        self.child(name).map(|c| c.text.clone())
    }

    pub fn number_child<T: FromStr>(&self, name: &str) -> Option<T> {
        self.child(name).and_then(|c| c.text.trim().parse().ok())
    }

    pub fn bool_child(&self, name: &str) -> Option<bool> {
        self.child(name).map(|c| c.text.trim() == "1")
    }
}

pub fn parse_document(input: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let mut el = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Default::default()
                };
                for a in e.attributes() {
                    let a = a.map_err(|e| malformed(format!("bad attribute: {e}")))?;
                    el.attrs.push((
                        String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                        String::from_utf8_lossy(&a.value).into_owned(),
                    ));
                }
                stack.push(el);
            }
            Event::Empty(e) => {
                let el = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => root = Some(el),
                }
            }
            Event::Text(t) => {
                if let Some(el) = stack.last_mut() {
                    el.text.push_str(&t.unescape()?);
                }
            }
            Event::End(_) => {
                let el = stack.pop().ok_or_else(|| malformed("unbalanced close tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(el),
                    None => root = Some(el),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    root.ok_or_else(|| malformed("no root element"))
}

// --- writing -------------------------------------------------------------

type W<'a> = Writer<&'a mut Vec<u8>>;

fn simple(w: &mut W<'_>, name: &str, value: &str) -> std::io::Result<()> {
    w.create_element(name)
        .write_text_content(BytesText::new(value))?;
    Ok(())
}

fn bool_tag(w: &mut W<'_>, name: &str, value: bool) -> std::io::Result<()> {
    simple(w, name, if value { "1" } else { "0" })
}

fn write_video(w: &mut W<'_>, v: &VideoPart) -> std::io::Result<()> {
    w.create_element("Video")
        .write_inner_content(|w| -> std::io::Result<()> {
            simple(w, "FrameRate", &v.frame_rate.to_string())?;
            simple(w, "Length", &v.length.to_string())?;
            simple(w, "Width", &v.size.width.to_string())?;
            simple(w, "Height", &v.size.height.to_string())?;
            let frame_type = match v.frame_type {
                VideoFrameType::TwoD => "2d",
                VideoFrameType::ThreeDLeftRight => "3d-left-right",
                VideoFrameType::ThreeDTopBottom => "3d-top-bottom",
            };
            simple(w, "FrameType", frame_type)?;
            simple(w, "LeftCrop", &v.crop.left.to_string())?;
            simple(w, "RightCrop", &v.crop.right.to_string())?;
            simple(w, "TopCrop", &v.crop.top.to_string())?;
            simple(w, "BottomCrop", &v.crop.bottom.to_string())?;
            match v.scale {
                VideoScale::Fit => simple(w, "Scale", "fit")?,
                VideoScale::Stretch => simple(w, "Scale", "stretch")?,
                VideoScale::Ratio(r) => simple(w, "Scale", &r.to_string())?,
            }
            if let Some(cc) = &v.colour_conversion {
                simple(w, "ColourConversion", cc)?;
            }
            simple(w, "FadeIn", &v.fade_in.get().to_string())?;
            simple(w, "FadeOut", &v.fade_out.get().to_string())?;
            Ok(())
        })?;
    Ok(())
}

fn write_audio(w: &mut W<'_>, a: &AudioPart) -> std::io::Result<()> {
    w.create_element("Audio")
        .write_inner_content(|w| -> std::io::Result<()> {
            simple(w, "FrameRate", &a.frame_rate.to_string())?;
            simple(w, "Length", &a.length.to_string())?;
            simple(w, "Channels", &a.channels.to_string())?;
            simple(w, "Gain", &a.gain_db.to_string())?;
            simple(w, "Delay", &a.delay_ms.to_string())?;
            for i in 0..a.mapping.input_channels() {
                for o in 0..a.mapping.output_channels() {
                    let gain = a.mapping.get(i, o);
                    if gain != 0.0 {
                        let mut el = BytesStart::new("Map");
                        el.push_attribute(("Input", i.to_string().as_str()));
                        el.push_attribute(("Output", o.to_string().as_str()));
                        w.write_event(Event::Start(el))?;
                        w.write_event(Event::Text(BytesText::new(&gain.to_string())))?;
                        w.write_event(Event::End(BytesStart::new("Map").to_end()))?;
                    }
                }
            }
            Ok(())
        })?;
    Ok(())
}

fn write_text(w: &mut W<'_>, t: &TextPart) -> std::io::Result<()> {
    w.create_element("Text")
        .write_inner_content(|w| -> std::io::Result<()> {
            bool_tag(w, "Use", t.use_)?;
            bool_tag(w, "Burn", t.burn)?;
            simple(w, "XOffset", &t.x_offset.to_string())?;
            simple(w, "YOffset", &t.y_offset.to_string())?;
            simple(w, "XScale", &t.x_scale.to_string())?;
            simple(w, "YScale", &t.y_scale.to_string())?;
            simple(w, "Language", &t.language)?;
            if let Some(c) = t.colour {
                simple(w, "Red", &c.r.to_string())?;
                simple(w, "Green", &c.g.to_string())?;
                simple(w, "Blue", &c.b.to_string())?;
            }
            let effect = match t.effect {
                TextEffect::None => "none",
                TextEffect::Outline => "outline",
                TextEffect::Shadow => "shadow",
            };
            simple(w, "Effect", effect)?;
            if let Some(c) = t.effect_colour {
                simple(w, "EffectRed", &c.r.to_string())?;
                simple(w, "EffectGreen", &c.g.to_string())?;
                simple(w, "EffectBlue", &c.b.to_string())?;
            }
            simple(w, "LineSpacing", &t.line_spacing.to_string())?;
            if let Some(f) = t.fade_in {
                simple(w, "FadeIn", &f.get().to_string())?;
            }
            if let Some(f) = t.fade_out {
                simple(w, "FadeOut", &f.get().to_string())?;
            }
            simple(w, "OutlineWidth", &t.outline_width.to_string())?;
            for font in &t.fonts {
                w.create_element("Font")
                    .write_inner_content(|w| -> std::io::Result<()> {
                        simple(w, "Id", &font.id)?;
                        if let Some(file) = &font.file {
                            simple(w, "File", &file.to_string_lossy())?;
                        }
                        Ok(())
                    })?;
            }
            simple(w, "Type", t.kind.as_str())?;
            simple(w, "OriginalType", t.original_kind.as_str())?;
            if let Some(track) = &t.dcp_track {
                simple(w, "DCPTrack", track)?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_source(w: &mut W<'_>, source: &Source) -> std::io::Result<()> {
    match source {
        Source::Ffmpeg {
            audio_stream,
            subtitle_stream,
            filters,
            first_video,
            colour,
        } => {
            if let Some(s) = audio_stream {
                simple(w, "AudioStream", &s.to_string())?;
            }
            if let Some(s) = subtitle_stream {
                simple(w, "SubtitleStream", &s.to_string())?;
            }
            for f in filters {
                simple(w, "Filter", f)?;
            }
            if let Some(fv) = first_video {
                simple(w, "FirstVideo", &fv.get().to_string())?;
            }
            if let Some(v) = &colour.range {
                simple(w, "ColorRange", v)?;
            }
            if let Some(v) = &colour.primaries {
                simple(w, "ColorPrimaries", v)?;
            }
            if let Some(v) = &colour.transfer {
                simple(w, "ColorTransferCharacteristic", v)?;
            }
            if let Some(v) = &colour.matrix {
                simple(w, "Colorspace", v)?;
            }
            if let Some(v) = colour.bits_per_pixel {
                simple(w, "BitsPerPixel", &v.to_string())?;
            }
        }
        Source::Dcp {
            name,
            encrypted,
            kdm,
            kdm_valid,
            has_subtitles,
            reference_video,
            reference_audio,
            reference_text,
        } => {
            simple(w, "Name", name)?;
            bool_tag(w, "HasSubtitles", *has_subtitles)?;
            bool_tag(w, "Encrypted", *encrypted)?;
            if let Some(kdm) = kdm {
                simple(w, "KDM", kdm)?;
            }
            bool_tag(w, "KDMValid", *kdm_valid)?;
            bool_tag(w, "ReferenceVideo", *reference_video)?;
            bool_tag(w, "ReferenceAudio", *reference_audio)?;
            bool_tag(w, "ReferenceText", *reference_text)?;
        }
        Source::ImageSequence | Source::Sound | Source::SubRip => {}
    }
    Ok(())
}

fn write_content(w: &mut W<'_>, c: &Content) -> std::io::Result<()> {
    w.create_element("Content")
        .write_inner_content(|w| -> std::io::Result<()> {
            simple(w, "Type", c.source.type_name())?;
            simple(w, "Id", &c.id.to_string())?;
            for p in &c.paths {
                simple(w, "Path", &p.to_string_lossy())?;
            }
            simple(w, "Position", &c.position.get().to_string())?;
            simple(w, "TrimStart", &c.trim_start.get().to_string())?;
            simple(w, "TrimEnd", &c.trim_end.get().to_string())?;
            simple(w, "Length", &c.length.get().to_string())?;
            if let Some(r) = c.video_frame_rate {
                simple(w, "VideoFrameRate", &r.to_string())?;
            }
            if let Some(v) = &c.video {
                write_video(w, v)?;
            }
            if let Some(a) = &c.audio {
                write_audio(w, a)?;
            }
            for t in &c.texts {
                write_text(w, t)?;
            }
            write_source(w, &c.source)?;
            Ok(())
        })?;
    Ok(())
}

pub fn save_playlist(playlist: &Playlist, path: &Path) -> Result<(), XmlError> {
    let mut out = Vec::new();
    {
        let mut w = Writer::new_with_indent(&mut out, b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut root = BytesStart::new("Playlist");
        root.push_attribute(("Version", CURRENT_VERSION.to_string().as_str()));
        w.write_event(Event::Start(root))?;
        for c in playlist.content() {
            write_content(&mut w, &c)?;
        }
        w.write_event(Event::End(BytesStart::new("Playlist").to_end()))?;
    }
    std::fs::write(path, out)?;
    Ok(())
}

// --- reading -------------------------------------------------------------

fn read_video(el: &Element) -> Option<VideoPart> {
    let v = el.child("Video")?;
    let mut part = VideoPart::new(
        v.number_child("FrameRate").unwrap_or(24.0),
        v.number_child("Length").unwrap_or(0),
        Size::new(
            v.number_child("Width").unwrap_or(0),
            v.number_child("Height").unwrap_or(0),
        ),
    );
    part.frame_type = match v.string_child("FrameType").as_deref() {
        Some("3d-left-right") => VideoFrameType::ThreeDLeftRight,
        Some("3d-top-bottom") => VideoFrameType::ThreeDTopBottom,
        _ => VideoFrameType::TwoD,
    };
    part.crop = Crop {
        left: v.number_child("LeftCrop").unwrap_or(0),
        right: v.number_child("RightCrop").unwrap_or(0),
        top: v.number_child("TopCrop").unwrap_or(0),
        bottom: v.number_child("BottomCrop").unwrap_or(0),
    };
    part.scale = match v.string_child("Scale").as_deref() {
        Some("stretch") => VideoScale::Stretch,
        Some("fit") | None => VideoScale::Fit,
        Some(other) => other
            .parse()
            .map(VideoScale::Ratio)
            .unwrap_or(VideoScale::Fit),
    };
    part.colour_conversion = v.string_child("ColourConversion");
    part.fade_in = ContentTime::new(v.number_child("FadeIn").unwrap_or(0));
    part.fade_out = ContentTime::new(v.number_child("FadeOut").unwrap_or(0));
    Some(part)
}

fn read_audio(el: &Element) -> Option<AudioPart> {
    let a = el.child("Audio")?;
    let channels = a.number_child("Channels").unwrap_or(0);
    let mut part = AudioPart::new(
        a.number_child("FrameRate").unwrap_or(48_000),
        a.number_child("Length").unwrap_or(0),
        channels,
    );
    part.gain_db = a.number_child("Gain").unwrap_or(0.0);
    part.delay_ms = a.number_child("Delay").unwrap_or(0);

    let maps: Vec<_> = a.children_named("Map").collect();
    if !maps.is_empty() {
        let max_output = maps
            .iter()
            .filter_map(|m| m.attr("Output").and_then(|o| o.parse::<usize>().ok()))
            .max()
            .unwrap_or(0);
        let mut mapping =
            reelforge_audio::AudioMapping::new(channels, (max_output + 1).max(channels));
        for m in maps {
            let input: usize = m.attr("Input").and_then(|v| v.parse().ok())?;
            let output: usize = m.attr("Output").and_then(|v| v.parse().ok())?;
            let gain: f32 = m.text.trim().parse().ok()?;
            if input < mapping.input_channels() && output < mapping.output_channels() {
                mapping.set(input, output, gain);
            }
        }
        part.mapping = mapping;
    }
    Some(part)
}

/// Read one text part from `el`, which is the `<Text>` node for version >= 37
/// files and the content node itself for older ones.
fn read_text(el: &Element, version: u32) -> TextPart {
    let mut t = TextPart::new(TextKind::OpenSubtitle);

    if version >= 37 {
        t.use_ = el.bool_child("Use").unwrap_or(false);
        t.burn = el.bool_child("Burn").unwrap_or(false);
        t.x_offset = el.number_child("XOffset").unwrap_or(0.0);
        t.y_offset = el.number_child("YOffset").unwrap_or(0.0);
        t.x_scale = el.number_child("XScale").unwrap_or(1.0);
        t.y_scale = el.number_child("YScale").unwrap_or(1.0);
        t.language = el.string_child("Language").unwrap_or_default();
        t.fade_in = el.number_child("FadeIn").map(ContentTime::new);
        t.fade_out = el.number_child("FadeOut").map(ContentTime::new);
        t.kind = el
            .string_child("Type")
            .and_then(|s| TextKind::from_str(&s))
            .unwrap_or(TextKind::OpenSubtitle);
        t.original_kind = el
            .string_child("OriginalType")
            .and_then(|s| TextKind::from_str(&s))
            .unwrap_or(t.kind);
        t.dcp_track = el.string_child("DCPTrack");
    } else {
        t.use_ = el.bool_child("UseSubtitles").unwrap_or(false);
        t.burn = el.bool_child("BurnSubtitles").unwrap_or(false);
        // Before version 7 only a vertical offset was stored.
        t.x_offset = el.number_child("SubtitleXOffset").unwrap_or(0.0);
        t.y_offset = el
            .number_child("SubtitleYOffset")
            .or_else(|| el.number_child("SubtitleOffset"))
            .unwrap_or(0.0);
        // Before version 10 a single uniform scale was stored.
        if let Some(s) = el.number_child::<f64>("SubtitleScale") {
            t.x_scale = s;
            t.y_scale = s;
        } else {
            t.x_scale = el.number_child("SubtitleXScale").unwrap_or(1.0);
            t.y_scale = el.number_child("SubtitleYScale").unwrap_or(1.0);
        }
        t.language = el.string_child("SubtitleLanguage").unwrap_or_default();
        t.fade_in = el.number_child("SubtitleFadeIn").map(ContentTime::new);
        t.fade_out = el.number_child("SubtitleFadeOut").map(ContentTime::new);
    }

    t.line_spacing = el.number_child("LineSpacing").unwrap_or(1.0);
    t.outline_width = el.number_child("OutlineWidth").unwrap_or(4);

    let r = el.number_child::<u8>("Red");
    let g = el.number_child::<u8>("Green");
    let b = el.number_child::<u8>("Blue");
    if let (Some(r), Some(g), Some(b)) = (r, g, b) {
        t.colour = Some(Colour { r, g, b });
    }

    t.effect = match el.string_child("Effect").as_deref() {
        Some("outline") => TextEffect::Outline,
        Some("shadow") => TextEffect::Shadow,
        _ => TextEffect::None,
    };
    let er = el.number_child::<u8>("EffectRed");
    let eg = el.number_child::<u8>("EffectGreen");
    let eb = el.number_child::<u8>("EffectBlue");
    if let (Some(r), Some(g), Some(b)) = (er, eg, eb) {
        t.effect_colour = Some(Colour { r, g, b });
    }

    for f in el.children_named("Font") {
        t.fonts.push(Font {
            id: f.string_child("Id").unwrap_or_default(),
            file: f.string_child("File").map(PathBuf::from),
        });
    }

    t
}

fn read_source(el: &Element, type_name: &str) -> Result<Source, XmlError> {
    let source = match type_name {
        "FFmpeg" => Source::Ffmpeg {
            audio_stream: el.number_child("AudioStream"),
            subtitle_stream: el.number_child("SubtitleStream"),
            filters: el.children_named("Filter").map(|f| f.text.clone()).collect(),
            first_video: el.number_child("FirstVideo").map(ContentTime::new),
            colour: FfmpegColour {
                range: el.string_child("ColorRange"),
                primaries: el.string_child("ColorPrimaries"),
                transfer: el.string_child("ColorTransferCharacteristic"),
                matrix: el.string_child("Colorspace"),
                bits_per_pixel: el.number_child("BitsPerPixel"),
            },
        },
        "Image" => Source::ImageSequence,
        "Sound" => Source::Sound,
        "SubRip" => Source::SubRip,
        "DCP" => Source::Dcp {
            name: el.string_child("Name").unwrap_or_default(),
            encrypted: el.bool_child("Encrypted").unwrap_or(false),
            kdm: el.string_child("KDM"),
            kdm_valid: el.bool_child("KDMValid").unwrap_or(false),
            has_subtitles: el.bool_child("HasSubtitles").unwrap_or(false),
            reference_video: el.bool_child("ReferenceVideo").unwrap_or(false),
            reference_audio: el.bool_child("ReferenceAudio").unwrap_or(false),
            reference_text: el.bool_child("ReferenceText").unwrap_or(false),
        },
        other => return Err(malformed(format!("unknown content type '{other}'"))),
    };
    Ok(source)
}

fn read_content(el: &Element, version: u32) -> Result<Content, XmlError> {
    let type_name = el
        .string_child("Type")
        .ok_or_else(|| malformed("content with no Type"))?;
    let source = read_source(el, &type_name)?;

    let mut c = Content::new(
        source,
        el.children_named("Path")
            .map(|p| PathBuf::from(&p.text))
            .collect(),
    );
    if let Some(id) = el.string_child("Id").and_then(|s| ContentId::parse(&s)) {
        c.id = id;
    }
    c.position = DcpTime::new(el.number_child("Position").unwrap_or(0));
    c.trim_start = ContentTime::new(el.number_child("TrimStart").unwrap_or(0));
    c.trim_end = ContentTime::new(el.number_child("TrimEnd").unwrap_or(0));
    c.length = ContentTime::new(el.number_child("Length").unwrap_or(0));
    c.video_frame_rate = el.number_child("VideoFrameRate");
    c.video = read_video(el);
    c.audio = read_audio(el);

    if version >= 37 {
        for t in el.children_named("Text") {
            c.texts.push(read_text(t, version));
        }
    } else {
        // Old FFmpeg content carries subtitle tags even with no subtitle
        // streams; require a stream before accepting them.
        let skip = version < 34
            && type_name == "FFmpeg"
            && el.children_named("SubtitleStream").next().is_none();
        let has_any = el.child("SubtitleXOffset").is_some() || el.child("SubtitleOffset").is_some();
        if !skip && has_any {
            c.texts.push(read_text(el, version));
        }
    }

    Ok(c)
}

pub fn load_playlist(path: &Path) -> Result<Playlist, XmlError> {
    let input = std::fs::read_to_string(path)?;
    let root = parse_document(&input)?;
    if root.name != "Playlist" {
        return Err(malformed(format!("unexpected root element '{}'", root.name)));
    }
    let version: u32 = root
        .attr("Version")
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| malformed("missing Version attribute"))?;

    let playlist = Playlist::new();
    let mut items = 0;
    for el in root.children_named("Content") {
        playlist.add(read_content(el, version)?);
        items += 1;
    }
    debug!(version, items, "loaded playlist from {}", path.display());
    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn sample_content() -> Content {
        let mut c = Content::new(Source::ffmpeg(), vec![PathBuf::from("/media/feature.mov")]);
        c.position = DcpTime::from_seconds(1.5);
        c.trim_start = ContentTime::from_seconds(0.5);
        c.length = ContentTime::from_seconds(60.0);
        c.video = Some(VideoPart::new(25.0, 1500, Size::new(1920, 1080)));
        let mut audio = AudioPart::new(48_000, 2_880_000, 2);
        audio.gain_db = -3.0;
        c.audio = Some(audio);
        let mut text = TextPart::new(TextKind::OpenSubtitle);
        text.use_ = true;
        text.burn = true;
        text.y_offset = 0.1;
        text.fonts.push(Font {
            id: "main".to_string(),
            file: Some(PathBuf::from("/fonts/Inconsolata.ttf")),
        });
        c.texts.push(text);
        c
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playlist.xml");

        let playlist = Playlist::new();
        playlist.add(sample_content());
        save_playlist(&playlist, &path).unwrap();

        let loaded = load_playlist(&path).unwrap();
        let original = playlist.content();
        let read = loaded.content();
        assert_eq!(original, read);
    }

    #[test]
    fn loads_version_10_tags() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Playlist Version="10">
  <Content>
    <Type>SubRip</Type>
    <Path>/subs/feature.srt</Path>
    <Position>0</Position>
    <TrimStart>0</TrimStart>
    <TrimEnd>0</TrimEnd>
    <Length>960000</Length>
    <UseSubtitles>1</UseSubtitles>
    <BurnSubtitles>0</BurnSubtitles>
    <SubtitleXOffset>0.05</SubtitleXOffset>
    <SubtitleYOffset>0.1</SubtitleYOffset>
    <SubtitleScale>0.9</SubtitleScale>
    <SubtitleLanguage>en</SubtitleLanguage>
  </Content>
</Playlist>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.xml");
        std::fs::write(&path, xml).unwrap();

        let playlist = load_playlist(&path).unwrap();
        let content = playlist.content();
        assert_eq!(content.len(), 1);
        let t = &content[0].texts[0];
        assert!(t.use_);
        assert!(!t.burn);
        assert_eq!(t.x_offset, 0.05);
        assert_eq!(t.y_offset, 0.1);
        assert_eq!(t.x_scale, 0.9);
        assert_eq!(t.y_scale, 0.9);
        assert_eq!(t.language, "en");
    }

    #[test]
    fn old_ffmpeg_subtitle_tags_need_a_stream() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Playlist Version="30">
  <Content>
    <Type>FFmpeg</Type>
    <Path>/media/a.mov</Path>
    <Position>0</Position>
    <Length>96000</Length>
    <SubtitleXOffset>0</SubtitleXOffset>
    <SubtitleYOffset>0</SubtitleYOffset>
  </Content>
</Playlist>"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.xml");
        std::fs::write(&path, xml).unwrap();

        let playlist = load_playlist(&path).unwrap();
        assert!(playlist.content()[0].texts.is_empty());
    }

    #[test]
    fn dcp_fields_round_trip() {
        let mut c = Content::new(
            Source::Dcp {
                name: "Feature_FTR".to_string(),
                encrypted: true,
                kdm: Some("a-kdm-blob".to_string()),
                kdm_valid: true,
                has_subtitles: true,
                reference_video: true,
                reference_audio: false,
                reference_text: false,
            },
            vec![PathBuf::from("/dcp/feature")],
        );
        c.length = ContentTime::from_seconds(10.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dcp.xml");
        let playlist = Playlist::new();
        playlist.add(c);
        save_playlist(&playlist, &path).unwrap();

        let loaded = load_playlist(&path).unwrap();
        assert_eq!(loaded.content(), playlist.content());
    }
}
