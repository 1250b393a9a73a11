use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ColumnLayout, Result, ToolkitError};

/// `Type` bit marking a regular note.
pub const NOTE_BIT: u32 = 1;
/// `Type` bit marking a mania hold.
pub const HOLD_BIT: u32 = 128;
/// Hit sample written when a record carries none.
pub const DEFAULT_SAMPLE: &str = "0:0:0:0:";

/// Game mode value for osu!mania charts.
pub const MANIA_MODE: &str = "3";

/// Characters that cannot appear in file names on common filesystems.
const FORBIDDEN_FILE_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// A single tap or hold.
///
/// Values are immutable; the `with_*` methods return an adjusted copy and
/// re-derive the encoded fields (`x`, the hold bit and the end time carried in
/// the hit sample) so they can never drift from `column` and `end_time`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitObject {
    column: usize,
    key_count: usize,
    x: i32,
    y: i32,
    start_time: i32,
    end_time: i32,
    /// `Type` bits other than the note/hold markers (new combo and friends).
    flags: u32,
    hit_sound: i32,
    /// Hit sample with the hold end time stripped.
    sample: String,
}

impl HitObject {
    /// Creates a tap in `column`.
    pub fn tap(layout: &ColumnLayout, column: usize, start_time: i32) -> Self {
        Self {
            column,
            key_count: layout.keys(),
            x: layout.x_of(column),
            y: 192,
            start_time,
            end_time: start_time,
            flags: 0,
            hit_sound: 0,
            sample: DEFAULT_SAMPLE.to_string(),
        }
    }

    /// Creates a hold in `column`. An `end_time` at or before `start_time`
    /// yields a tap.
    pub fn hold(layout: &ColumnLayout, column: usize, start_time: i32, end_time: i32) -> Self {
        Self::tap(layout, column, start_time).with_end_time(end_time)
    }

    /// Decodes the positional fields of a `[HitObjects]` record.
    ///
    /// The hold end time is read once here. A hold whose end time is missing,
    /// unparsable or earlier than its start is treated as a tap.
    pub fn from_record(
        layout: &ColumnLayout,
        x: i32,
        y: i32,
        start_time: i32,
        kind: u32,
        hit_sound: i32,
        hit_sample: &str,
    ) -> Self {
        let (end_time, sample) = if kind & HOLD_BIT != 0 {
            let (end, rest) = hit_sample
                .split_once(':')
                .unwrap_or((hit_sample, DEFAULT_SAMPLE));
            (
                parse_end_time(end).filter(|end| *end >= start_time),
                rest.to_string(),
            )
        } else {
            (None, hit_sample.to_string())
        };

        Self {
            column: layout.column_of(x),
            key_count: layout.keys(),
            x,
            y,
            start_time,
            end_time: end_time.unwrap_or(start_time),
            flags: kind & !(NOTE_BIT | HOLD_BIT),
            hit_sound,
            sample,
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn key_count(&self) -> usize {
        self.key_count
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn start_time(&self) -> i32 {
        self.start_time
    }

    pub fn end_time(&self) -> i32 {
        self.end_time
    }

    pub fn hit_sound(&self) -> i32 {
        self.hit_sound
    }

    /// Opaque hit sample payload, without the hold end time.
    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn is_hold(&self) -> bool {
        self.end_time != self.start_time
    }

    pub fn duration(&self) -> i32 {
        self.end_time - self.start_time
    }

    /// Encoded `Type` field.
    pub fn kind(&self) -> u32 {
        if self.is_hold() {
            self.flags | HOLD_BIT
        } else {
            self.flags | NOTE_BIT
        }
    }

    /// Encoded `HitSample` field. Holds carry their end time as the first
    /// colon-separated value.
    pub fn encoded_sample(&self) -> String {
        if self.is_hold() {
            format!("{}:{}", self.end_time, self.sample)
        } else {
            self.sample.clone()
        }
    }

    /// Copy with a new end time, clamped so it never precedes the start.
    pub fn with_end_time(&self, end_time: i32) -> Self {
        Self {
            end_time: end_time.max(self.start_time),
            ..self.clone()
        }
    }

    /// Copy converted to a tap.
    pub fn to_tap(&self) -> Self {
        self.with_end_time(self.start_time)
    }

    /// Copy moved to `column` of `layout`.
    pub fn with_column(&self, layout: &ColumnLayout, column: usize) -> Self {
        Self {
            column,
            key_count: layout.keys(),
            x: layout.x_of(column),
            ..self.clone()
        }
    }

    /// Copy re-positioned for a different key count, keeping its column index.
    pub fn with_key_count(&self, layout: &ColumnLayout) -> Self {
        self.with_column(layout, self.column)
    }
}

/// Splits objects already sorted by start time into runs sharing a start time.
pub fn time_groups(objects: &[HitObject]) -> Vec<&[HitObject]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for i in 1..=objects.len() {
        if i == objects.len() || objects[i].start_time != objects[start].start_time {
            if i > start {
                groups.push(&objects[start..i]);
            }
            start = i;
        }
    }
    groups
}

fn parse_end_time(value: &str) -> Option<i32> {
    let value = value.trim();
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v as i32))
}

/// Entry of the `[TimingPoints]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub time: f64,
    /// Milliseconds per beat. Negative values mark inherited points.
    pub beat_length: f64,
    pub meter: i32,
    pub sample_set: i32,
    pub sample_index: i32,
    pub volume: i32,
    pub uninherited: bool,
    pub effects: i32,
}

impl TimingPoint {
    /// Creates an uninherited point in 4/4 with default samples.
    pub fn new(time: f64, beat_length: f64) -> Self {
        Self {
            time,
            beat_length,
            meter: 4,
            sample_set: 1,
            sample_index: 0,
            volume: 100,
            uninherited: true,
            effects: 0,
        }
    }

    pub fn is_inherited(&self) -> bool {
        self.beat_length < 0.0
    }
}

/// Entry of the `[Colours]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Colour {
    pub name: String,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: Option<u8>,
}

/// `[General]` values, kept as the raw strings found in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct General {
    pub audio_filename: String,
    pub audio_lead_in: String,
    pub preview_time: String,
    pub countdown: String,
    pub sample_set: String,
    pub stack_leniency: String,
    pub mode: String,
    pub letterbox_in_breaks: String,
    pub special_style: String,
    pub widescreen_storyboard: String,
}

/// `[Metadata]` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: String,
    pub title_unicode: String,
    pub artist: String,
    pub artist_unicode: String,
    pub creator: String,
    /// Difficulty name (`Version` in the file).
    pub version: String,
    pub source: String,
    pub tags: String,
    pub beatmap_id: String,
    pub beatmap_set_id: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            title_unicode: String::new(),
            artist: String::new(),
            artist_unicode: String::new(),
            creator: String::new(),
            version: String::new(),
            source: String::new(),
            tags: String::new(),
            beatmap_id: "0".to_string(),
            beatmap_set_id: "-1".to_string(),
        }
    }
}

/// `[Difficulty]` values. The key count (`CircleSize`) lives on [`Beatmap`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    pub hp_drain_rate: f64,
    pub overall_difficulty: f64,
    pub approach_rate: f64,
    pub slider_multiplier: f64,
    pub slider_tick_rate: f64,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self {
            hp_drain_rate: 0.0,
            overall_difficulty: 0.0,
            approach_rate: 5.0,
            slider_multiplier: 1.4,
            slider_tick_rate: 1.0,
        }
    }
}

/// A parsed chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Beatmap {
    /// Tag from the `osu file format vN` header.
    pub format_version: String,
    pub general: General,
    pub metadata: Metadata,
    pub difficulty: Difficulty,
    pub key_count: usize,
    /// `[Events]` lines, verbatim.
    pub events: Vec<String>,
    pub timing_points: Vec<TimingPoint>,
    pub colours: Vec<Colour>,
    pub hit_objects: Vec<HitObject>,
    pub source_path: Option<PathBuf>,
}

impl Default for Beatmap {
    fn default() -> Self {
        Self {
            format_version: "v14".to_string(),
            general: General {
                mode: MANIA_MODE.to_string(),
                ..Default::default()
            },
            metadata: Metadata::default(),
            difficulty: Difficulty::default(),
            key_count: 4,
            events: Vec::new(),
            timing_points: Vec::new(),
            colours: Vec::new(),
            hit_objects: Vec::new(),
            source_path: None,
        }
    }
}

impl Beatmap {
    /// Column table for the current key count.
    pub fn layout(&self) -> Result<ColumnLayout> {
        ColumnLayout::for_keys(self.key_count)
    }

    pub fn is_mania(&self) -> bool {
        self.general.mode.trim() == MANIA_MODE
    }

    pub fn hold_count(&self) -> usize {
        self.hit_objects.iter().filter(|obj| obj.is_hold()).count()
    }

    /// Number of notes in each column.
    pub fn column_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.key_count];
        for obj in &self.hit_objects {
            if let Some(count) = counts.get_mut(obj.column()) {
                *count += 1;
            }
        }
        counts
    }

    /// Sorts hit objects by start time, keeping file order on ties.
    pub fn sort_hit_objects(&mut self) {
        self.hit_objects.sort_by_key(HitObject::start_time);
    }

    /// Changes the key count and re-encodes every note for the new layout.
    /// Column indices are left untouched.
    pub fn set_key_count(&mut self, keys: usize) -> Result<()> {
        let layout = ColumnLayout::for_keys(keys)?;
        self.key_count = keys;
        for obj in &mut self.hit_objects {
            *obj = obj.with_key_count(&layout);
        }
        Ok(())
    }

    /// Keeps only the listed columns, renumbered left to right in list order.
    pub fn select_columns(&mut self, columns: &[usize]) -> Result<()> {
        if let Some(bad) = columns.iter().find(|c| **c >= self.key_count) {
            return Err(ToolkitError::validation(format!(
                "column {bad} is outside a {}K chart",
                self.key_count
            )));
        }
        let layout = ColumnLayout::for_keys(columns.len())?;

        self.hit_objects = self
            .hit_objects
            .iter()
            .filter_map(|obj| {
                columns
                    .iter()
                    .position(|c| *c == obj.column())
                    .map(|index| obj.with_column(&layout, index))
            })
            .collect();
        self.key_count = columns.len();
        Ok(())
    }

    /// Drops the listed columns and closes the gaps they leave.
    pub fn remove_columns(&mut self, columns: &[usize]) -> Result<()> {
        let remaining: Vec<usize> = (0..self.key_count)
            .filter(|c| !columns.contains(c))
            .collect();
        self.select_columns(&remaining)
    }

    /// `Artist - Title (Creator) [Difficulty]` with forbidden characters
    /// removed, plus the chart extension.
    pub fn output_file_name(&self) -> String {
        let name = format!(
            "{} - {} ({}) [{}]",
            self.metadata.artist, self.metadata.title, self.metadata.creator, self.metadata.version
        );
        let mut cleaned: String = name
            .chars()
            .filter(|c| !FORBIDDEN_FILE_CHARS.contains(c))
            .collect();
        cleaned.push_str(crate::codec::FILE_EXTENSION);
        cleaned
    }

    /// Prefixes the difficulty name with a transformation tag.
    pub fn push_difficulty_tag(&mut self, tag: &str) {
        self.metadata.version.insert_str(0, tag);
    }

    /// Overwrites the creator with `replacement` when one is given, otherwise
    /// appends ` & {tool}`.
    pub fn credit(&mut self, tool: &str, replacement: Option<&str>) {
        match replacement.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => self.metadata.creator = name.to_string(),
            None => {
                self.metadata.creator.push_str(" & ");
                self.metadata.creator.push_str(tool);
            }
        }
    }

    /// Overview used by the command line `inspect` output.
    pub fn summary(&self) -> ChartSummary {
        ChartSummary {
            title: self.metadata.title.clone(),
            artist: self.metadata.artist.clone(),
            creator: self.metadata.creator.clone(),
            difficulty: self.metadata.version.clone(),
            key_count: self.key_count,
            notes: self.hit_objects.len(),
            holds: self.hold_count(),
            timing_points: self.timing_points.len(),
            output_name: self.output_file_name(),
        }
    }
}

/// Serializable overview of a chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSummary {
    pub title: String,
    pub artist: String,
    pub creator: String,
    pub difficulty: String,
    pub key_count: usize,
    pub notes: usize,
    pub holds: usize,
    pub timing_points: usize,
    pub output_name: String,
}
