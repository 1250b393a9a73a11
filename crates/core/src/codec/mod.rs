//! Reader and writer for the line-oriented `.osu` chart format.
//!
//! Parsing is a small state machine over trimmed lines. Section headers
//! switch the active section; unknown headers park the reader in a section
//! whose lines are ignored. Hit objects are decoded after the whole file has
//! been read so that the key count is known regardless of section order.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::{
    beatmap::{Colour, Difficulty, General, Metadata},
    Beatmap, ColumnLayout, HitObject, Result, TimingPoint, ToolkitError,
};

/// Extension of chart files.
pub const FILE_EXTENSION: &str = ".osu";

const VERSION_PREFIX: &str = "osu file format";
const TIMING_POINT_FIELDS: usize = 8;
const HIT_OBJECT_FIELDS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    General,
    Metadata,
    Difficulty,
    Events,
    TimingPoints,
    Colours,
    HitObjects,
    Unknown,
}

impl Section {
    fn from_header(header: &str) -> Self {
        match header {
            "[General]" => Self::General,
            "[Metadata]" => Self::Metadata,
            "[Difficulty]" => Self::Difficulty,
            "[Events]" => Self::Events,
            "[TimingPoints]" => Self::TimingPoints,
            "[Colours]" => Self::Colours,
            "[HitObjects]" => Self::HitObjects,
            _ => Self::Unknown,
        }
    }

    fn required() -> [Self; 5] {
        [
            Self::General,
            Self::Metadata,
            Self::Difficulty,
            Self::TimingPoints,
            Self::HitObjects,
        ]
    }

    fn name(self) -> &'static str {
        match self {
            Self::Preamble => "preamble",
            Self::General => "[General]",
            Self::Metadata => "[Metadata]",
            Self::Difficulty => "[Difficulty]",
            Self::Events => "[Events]",
            Self::TimingPoints => "[TimingPoints]",
            Self::Colours => "[Colours]",
            Self::HitObjects => "[HitObjects]",
            Self::Unknown => "unknown section",
        }
    }
}

/// Parses chart text into a [`Beatmap`].
pub fn parse(text: &str) -> Result<Beatmap> {
    let mut beatmap = Beatmap {
        general: General::default(),
        ..Default::default()
    };
    let mut section = Section::Preamble;
    let mut seen: Vec<Section> = Vec::new();
    let mut circle_size: Option<f64> = None;
    let mut raw_objects: Vec<(usize, &str)> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        if let Some(version) = line.strip_prefix(VERSION_PREFIX) {
            let version = version.trim();
            if !version.is_empty() {
                beatmap.format_version = version.to_string();
            }
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = Section::from_header(line);
            if !seen.contains(&section) {
                seen.push(section);
            }
            continue;
        }

        match section {
            Section::General => {
                if let Some((key, value)) = key_value(line) {
                    apply_general(&mut beatmap.general, key, value);
                }
            }
            Section::Metadata => {
                if let Some((key, value)) = key_value(line) {
                    apply_metadata(&mut beatmap.metadata, key, value);
                }
            }
            Section::Difficulty => {
                if let Some((key, value)) = key_value(line) {
                    if key == "CircleSize" {
                        circle_size = Some(parse_float(value, line_no, key)?);
                    } else {
                        apply_difficulty(&mut beatmap.difficulty, key, value, line_no)?;
                    }
                }
            }
            Section::Events => beatmap.events.push(line.to_string()),
            Section::TimingPoints => beatmap.timing_points.push(parse_timing_point(line, line_no)?),
            Section::Colours => beatmap.colours.push(parse_colour(line, line_no)?),
            Section::HitObjects => raw_objects.push((line_no, line)),
            Section::Preamble | Section::Unknown => {}
        }
    }

    if let Some(missing) = Section::required().into_iter().find(|s| !seen.contains(s)) {
        return Err(ToolkitError::format(
            0,
            format!("missing {} section", missing.name()),
        ));
    }

    if !beatmap.is_mania() {
        return Err(ToolkitError::validation(format!(
            "unsupported game mode `{}`",
            beatmap.general.mode
        )));
    }

    let circle_size =
        circle_size.ok_or_else(|| ToolkitError::format(0, "missing CircleSize in [Difficulty]"))?;
    beatmap.key_count = circle_size as usize;
    let layout = ColumnLayout::for_keys(beatmap.key_count)
        .map_err(|_| ToolkitError::format(0, format!("unsupported key count {circle_size}")))?;

    beatmap.hit_objects = raw_objects
        .into_iter()
        .map(|(line_no, line)| parse_hit_object(line, line_no, &layout))
        .collect::<Result<_>>()?;

    Ok(beatmap)
}

/// Serializes a chart. Sections and keys are always written in canonical
/// order.
pub fn serialize(beatmap: &Beatmap) -> String {
    beatmap.to_string()
}

/// Reads and parses a chart file, recording its path.
pub fn parse_file(path: &Path) -> Result<Beatmap> {
    let text = fs::read_to_string(path)?;
    let mut beatmap = parse(&text)?;
    beatmap.source_path = Some(path.to_path_buf());
    Ok(beatmap)
}

/// Writes the chart into `dir` under its derived file name and returns the
/// final path.
///
/// The text is written to a hidden sibling first and renamed into place, so a
/// failed write never leaves a truncated chart behind.
pub fn write_file(beatmap: &Beatmap, dir: &Path) -> Result<PathBuf> {
    let text = serialize(beatmap);
    let name = beatmap.output_file_name();
    let target = dir.join(&name);
    let staging = dir.join(format!(".{name}.tmp"));

    if let Err(err) = fs::write(&staging, text).and_then(|_| fs::rename(&staging, &target)) {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }

    tracing::debug!(path = %target.display(), "wrote chart");
    Ok(target)
}

fn key_value(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(key, value)| (key.trim(), value.trim()))
}

fn apply_general(general: &mut General, key: &str, value: &str) {
    let slot = match key {
        "AudioFilename" => &mut general.audio_filename,
        "AudioLeadIn" => &mut general.audio_lead_in,
        "PreviewTime" => &mut general.preview_time,
        "Countdown" => &mut general.countdown,
        "SampleSet" => &mut general.sample_set,
        "StackLeniency" => &mut general.stack_leniency,
        "Mode" => &mut general.mode,
        "LetterboxInBreaks" => &mut general.letterbox_in_breaks,
        "SpecialStyle" => &mut general.special_style,
        "WidescreenStoryboard" => &mut general.widescreen_storyboard,
        _ => return,
    };
    *slot = value.to_string();
}

fn apply_metadata(metadata: &mut Metadata, key: &str, value: &str) {
    let slot = match key {
        "Title" => &mut metadata.title,
        "TitleUnicode" => &mut metadata.title_unicode,
        "Artist" => &mut metadata.artist,
        "ArtistUnicode" => &mut metadata.artist_unicode,
        "Creator" => &mut metadata.creator,
        "Version" => &mut metadata.version,
        "Source" => &mut metadata.source,
        "Tags" => &mut metadata.tags,
        "BeatmapID" => &mut metadata.beatmap_id,
        "BeatmapSetID" => &mut metadata.beatmap_set_id,
        _ => return,
    };
    *slot = value.to_string();
}

fn apply_difficulty(
    difficulty: &mut Difficulty,
    key: &str,
    value: &str,
    line_no: usize,
) -> Result<()> {
    let slot = match key {
        "HPDrainRate" => &mut difficulty.hp_drain_rate,
        "OverallDifficulty" => &mut difficulty.overall_difficulty,
        "ApproachRate" => &mut difficulty.approach_rate,
        "SliderMultiplier" => &mut difficulty.slider_multiplier,
        "SliderTickRate" => &mut difficulty.slider_tick_rate,
        _ => return Ok(()),
    };
    *slot = parse_float(value, line_no, key)?;
    Ok(())
}

fn parse_float(value: &str, line_no: usize, field: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ToolkitError::format(line_no, format!("{field}: `{value}` is not a number")))
}

/// Integer fields accept decimal spellings and truncate toward zero.
fn parse_int(value: &str, line_no: usize, field: &str) -> Result<i32> {
    let value = value.trim();
    if let Ok(v) = value.parse::<i32>() {
        return Ok(v);
    }
    let v = parse_float(value, line_no, field)?;
    if v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
        return Err(ToolkitError::format(line_no, format!("{field}: `{value}` is out of range")));
    }
    Ok(v as i32)
}

fn split_record<'a>(
    line: &'a str,
    arity: usize,
    line_no: usize,
    what: &str,
) -> Result<Vec<&'a str>> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != arity {
        return Err(ToolkitError::format(
            line_no,
            format!("{what} expects {arity} fields, found {}", fields.len()),
        ));
    }
    Ok(fields)
}

fn parse_timing_point(line: &str, line_no: usize) -> Result<TimingPoint> {
    let f = split_record(line, TIMING_POINT_FIELDS, line_no, "timing point")?;
    Ok(TimingPoint {
        time: parse_float(f[0], line_no, "Time")?,
        beat_length: parse_float(f[1], line_no, "BeatLength")?,
        meter: parse_int(f[2], line_no, "Meter")?,
        sample_set: parse_int(f[3], line_no, "SampleSet")?,
        sample_index: parse_int(f[4], line_no, "SampleIndex")?,
        volume: parse_int(f[5], line_no, "Volume")?,
        uninherited: parse_int(f[6], line_no, "Uninherited")? != 0,
        effects: parse_int(f[7], line_no, "Effects")?,
    })
}

fn parse_colour(line: &str, line_no: usize) -> Result<Colour> {
    let (name, rgb) = key_value(line)
        .ok_or_else(|| ToolkitError::format(line_no, "colour expects `Name: R,G,B`"))?;
    let parts: Vec<&str> = rgb.split(',').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(ToolkitError::format(
            line_no,
            format!("colour expects 3 or 4 components, found {}", parts.len()),
        ));
    }

    let component = |value: &str| -> Result<u8> {
        let v = parse_int(value, line_no, name)?;
        u8::try_from(v)
            .map_err(|_| ToolkitError::format(line_no, format!("{name}: {v} is not a colour component")))
    };

    Ok(Colour {
        name: name.to_string(),
        red: component(parts[0])?,
        green: component(parts[1])?,
        blue: component(parts[2])?,
        alpha: parts.get(3).copied().map(&component).transpose()?,
    })
}

fn parse_hit_object(line: &str, line_no: usize, layout: &ColumnLayout) -> Result<HitObject> {
    let f = split_record(line, HIT_OBJECT_FIELDS, line_no, "hit object")?;
    let kind = parse_int(f[3], line_no, "Type")?;
    let kind = u32::try_from(kind)
        .map_err(|_| ToolkitError::format(line_no, format!("Type: {kind} is negative")))?;

    Ok(HitObject::from_record(
        layout,
        parse_int(f[0], line_no, "X")?,
        parse_int(f[1], line_no, "Y")?,
        parse_int(f[2], line_no, "StartTime")?,
        kind,
        parse_int(f[4], line_no, "HitSound")?,
        f[5],
    ))
}

impl fmt::Display for Beatmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.general;
        let m = &self.metadata;
        let d = &self.difficulty;

        writeln!(f, "{VERSION_PREFIX} {}", self.format_version)?;
        writeln!(f)?;

        writeln!(f, "[General]")?;
        writeln!(f, "AudioFilename: {}", g.audio_filename)?;
        writeln!(f, "AudioLeadIn: {}", g.audio_lead_in)?;
        writeln!(f, "PreviewTime: {}", g.preview_time)?;
        writeln!(f, "Countdown: {}", g.countdown)?;
        writeln!(f, "SampleSet: {}", g.sample_set)?;
        writeln!(f, "StackLeniency: {}", g.stack_leniency)?;
        writeln!(f, "Mode: {}", g.mode)?;
        writeln!(f, "LetterboxInBreaks: {}", g.letterbox_in_breaks)?;
        writeln!(f, "SpecialStyle: {}", g.special_style)?;
        writeln!(f, "WidescreenStoryboard: {}", g.widescreen_storyboard)?;
        writeln!(f)?;

        writeln!(f, "[Metadata]")?;
        writeln!(f, "Title:{}", m.title)?;
        writeln!(f, "TitleUnicode:{}", m.title_unicode)?;
        writeln!(f, "Artist:{}", m.artist)?;
        writeln!(f, "ArtistUnicode:{}", m.artist_unicode)?;
        writeln!(f, "Creator:{}", m.creator)?;
        writeln!(f, "Version:{}", m.version)?;
        writeln!(f, "Source:{}", m.source)?;
        writeln!(f, "Tags:{}", m.tags)?;
        writeln!(f, "BeatmapID:{}", m.beatmap_id)?;
        writeln!(f, "BeatmapSetID:{}", m.beatmap_set_id)?;
        writeln!(f)?;

        writeln!(f, "[Difficulty]")?;
        writeln!(f, "HPDrainRate:{}", d.hp_drain_rate)?;
        writeln!(f, "CircleSize:{}", self.key_count)?;
        writeln!(f, "OverallDifficulty:{}", d.overall_difficulty)?;
        writeln!(f, "ApproachRate:{}", d.approach_rate)?;
        writeln!(f, "SliderMultiplier:{}", d.slider_multiplier)?;
        writeln!(f, "SliderTickRate:{}", d.slider_tick_rate)?;
        writeln!(f)?;

        writeln!(f, "[Events]")?;
        for event in &self.events {
            writeln!(f, "{event}")?;
        }
        writeln!(f)?;

        writeln!(f, "[TimingPoints]")?;
        for p in &self.timing_points {
            writeln!(
                f,
                "{},{},{},{},{},{},{},{}",
                p.time,
                p.beat_length,
                p.meter,
                p.sample_set,
                p.sample_index,
                p.volume,
                u8::from(p.uninherited),
                p.effects
            )?;
        }
        writeln!(f)?;

        if !self.colours.is_empty() {
            writeln!(f, "[Colours]")?;
            for c in &self.colours {
                write!(f, "{} : {},{},{}", c.name, c.red, c.green, c.blue)?;
                if let Some(alpha) = c.alpha {
                    write!(f, ",{alpha}")?;
                }
                writeln!(f)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "[HitObjects]")?;
        for obj in &self.hit_objects {
            writeln!(
                f,
                "{},{},{},{},{},{}",
                obj.x(),
                obj.y(),
                obj.start_time(),
                obj.kind(),
                obj.hit_sound(),
                obj.encoded_sample()
            )?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{chart, FOUR_KEY};
    use super::*;

    #[test]
    fn parses_all_sections() {
        let map = parse(FOUR_KEY).unwrap();

        assert_eq!(map.format_version, "v14");
        assert_eq!(map.general.audio_filename, "audio.mp3");
        assert_eq!(map.general.widescreen_storyboard, "1");
        assert_eq!(map.metadata.title, "Re:Start");
        assert_eq!(map.metadata.version, "Hard");
        assert_eq!(map.metadata.beatmap_set_id, "45");
        assert_eq!(map.key_count, 4);
        assert_eq!(map.difficulty.overall_difficulty, 8.5);
        assert_eq!(map.events.len(), 3);
        assert_eq!(map.timing_points.len(), 2);
        assert!(map.timing_points[1].is_inherited());
        assert!(!map.timing_points[1].uninherited);
        assert_eq!(map.colours[0].name, "Combo1");
        assert_eq!(map.colours[0].alpha, None);

        let notes = &map.hit_objects;
        assert_eq!(notes.len(), 4);
        assert_eq!(notes[0].column(), 0);
        assert_eq!(notes[1].column(), 1);
        assert_eq!(notes[1].end_time(), 1400);
        assert_eq!(notes[2].column(), 3);
        assert_eq!(notes[2].sample(), "0:0:0:0:hit.wav");
        assert_eq!(notes[3].start_time(), 1500);
    }

    #[test]
    fn round_trips_semantic_fields() {
        let map = parse(FOUR_KEY).unwrap();
        let again = parse(&serialize(&map)).unwrap();
        assert_eq!(map, again);
    }

    #[test]
    fn round_trips_built_charts() {
        let map = chart(7, 333.3333, &[(0, 0, 0), (6, 100, 700), (3, 100, 100)]);
        let again = parse(&serialize(&map)).unwrap();
        assert_eq!(map, again);
    }

    #[test]
    fn writes_sections_in_canonical_order() {
        let shuffled = FOUR_KEY.replace("[Difficulty]", "[Scratch]");
        let shuffled = format!("{shuffled}\n[Difficulty]\nCircleSize:4\nOverallDifficulty:7\n");
        let map = parse(&shuffled).unwrap();
        let text = serialize(&map);

        let order: Vec<usize> = [
            "[General]",
            "[Metadata]",
            "[Difficulty]",
            "[Events]",
            "[TimingPoints]",
            "[Colours]",
            "[HitObjects]",
        ]
        .iter()
        .map(|h| text.find(h).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("OverallDifficulty:7\n"));
    }

    #[test]
    fn rejects_missing_sections() {
        let text = FOUR_KEY.replace("[TimingPoints]", "[Timing]");
        let err = parse(&text).unwrap_err();
        assert!(matches!(err, ToolkitError::Format { .. }));
        assert!(err.to_string().contains("[TimingPoints]"));
    }

    #[test]
    fn rejects_wrong_arity() {
        let text = FOUR_KEY.replace("320,192,1500.0,1,0,0:0:0:0:", "320,192,1500,1,0");
        let err = parse(&text).unwrap_err();
        match err {
            ToolkitError::Format { line, message } => {
                assert!(line > 0);
                assert!(message.contains("6 fields"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_numbers() {
        let text = FOUR_KEY.replace("OverallDifficulty:8.5", "OverallDifficulty:hard");
        assert!(matches!(parse(&text), Err(ToolkitError::Format { .. })));

        let text = FOUR_KEY.replace("0,500,4,2,0,60,1,0", "0,fast,4,2,0,60,1,0");
        assert!(matches!(parse(&text), Err(ToolkitError::Format { .. })));
    }

    #[test]
    fn rejects_other_modes() {
        let text = FOUR_KEY.replace("Mode: 3", "Mode: 0");
        assert!(matches!(parse(&text), Err(ToolkitError::Validation(_))));
    }

    #[test]
    fn keeps_colour_alpha() {
        let text = FOUR_KEY.replace("Combo1 : 255,128,0", "Combo1 : 255,128,0,200");
        let map = parse(&text).unwrap();
        assert_eq!(map.colours[0].alpha, Some(200));
        assert!(serialize(&map).contains("Combo1 : 255,128,0,200"));
    }

    #[test]
    fn writes_through_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let map = parse(FOUR_KEY).unwrap();
        let path = write_file(&map, dir.path()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "Someone - ReStart (mapper) [Hard].osu"
        );
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let reread = parse_file(&path).unwrap();
        assert_eq!(reread.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(reread.hit_objects, map.hit_objects);
    }
}
