//! Column-count conversion.
//!
//! The chart is cut into areas of roughly constant musical length. Each area
//! gets its own random mapping: `K' - K` source columns are duplicated into
//! `K' - K` freshly inserted lanes and every other note shifts right to make
//! room. A final pass per output column removes notes that would overlap.

use crate::{
    beatmap::time_groups, Beatmap, ColumnLayout, HitObject, KeyRemapParams, RandomSequencer,
    Result, Seed, TimingIndex, ToolkitError,
};

/// Name credited in the creator field.
pub const TOOL_NAME: &str = "KeyConverter";
/// Highest key count the converter produces.
pub const MAX_TARGET_KEYS: usize = 9;

/// Notes closer than this to the previous note in their column are merged.
const MERGE_INTERVAL_MS: i32 = 50;
/// Notes starting this soon after a hold ends are merged into it.
const HOLD_MERGE_INTERVAL_MS: i32 = 10;
/// Slack added to the clean interval.
const CLEAN_TOLERANCE_MS: f64 = 1.5;

/// Random column mapping of one area.
#[derive(Debug, Clone)]
struct AreaMapping {
    /// Source columns that get duplicated, paired by index with `insert`.
    copy: Vec<usize>,
    blank: Vec<bool>,
    /// Inserted destination lanes, ascending.
    insert: Vec<usize>,
}

impl AreaMapping {
    fn roll(rng: &mut RandomSequencer, from: usize, to: usize, blanks: usize) -> Self {
        let extra = to - from;
        let copy = rng.distinct(from, extra);
        let mut blank = vec![false; extra];
        for slot in rng.distinct(extra, blanks) {
            blank[slot] = true;
        }
        let mut insert = rng.distinct(to, extra);
        insert.sort_unstable();
        Self {
            copy,
            blank,
            insert,
        }
    }

    /// Maps one source note, pushing its duplicate (if any) before the note
    /// itself. Returns the duplicate's column when one was emitted.
    fn map_note(
        &self,
        note: &HitObject,
        layout: &ColumnLayout,
        out: &mut Vec<HitObject>,
    ) -> Option<usize> {
        let source = note.column();
        let mut column = source;
        let mut duplicate = None;

        for (j, insert) in self.insert.iter().enumerate() {
            if self.copy[j] == source && !self.blank[j] {
                out.push(note.with_column(layout, *insert));
                duplicate = Some(*insert);
            }
            if column >= *insert {
                column += 1;
            }
        }

        out.push(note.with_column(layout, column));
        duplicate
    }
}

/// Converts charts to a higher key count.
#[derive(Debug, Clone)]
pub struct KeyRemapper {
    params: KeyRemapParams,
}

impl KeyRemapper {
    pub fn new(params: KeyRemapParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KeyRemapParams {
        &self.params
    }

    /// Checks that the chart can be converted with these parameters.
    pub fn validate(&self, beatmap: &Beatmap) -> Result<()> {
        let from = beatmap.key_count;
        let to = self.params.target_keys;

        if !beatmap.is_mania() {
            return Err(ToolkitError::validation("not a mania chart"));
        }
        if to > MAX_TARGET_KEYS {
            return Err(ToolkitError::validation(format!(
                "target of {to} keys exceeds the {MAX_TARGET_KEYS}K limit"
            )));
        }
        if to <= from {
            return Err(ToolkitError::validation(format!(
                "cannot convert {from}K down or across to {to}K"
            )));
        }
        if to - from > from {
            return Err(ToolkitError::validation(format!(
                "cannot add {} columns to a {from}K chart",
                to - from
            )));
        }
        if !self.params.allowed_keys.is_empty() && !self.params.allowed_keys.contains(&from) {
            return Err(ToolkitError::validation(format!(
                "{from}K charts are excluded from conversion"
            )));
        }
        Ok(())
    }

    /// Converts `beatmap` in place with the given seed.
    pub fn convert(&self, beatmap: &mut Beatmap, seed: Seed) -> Result<()> {
        self.validate(beatmap)?;

        let from = beatmap.key_count;
        let to = self.params.target_keys;
        let blank = self.params.blank.min(to - from);
        let layout = ColumnLayout::for_keys(to)?;
        let timing = match self.params.clean {
            0 => None,
            _ => Some(TimingIndex::new(&beatmap.timing_points)?),
        };
        let threshold = self.params.gap_threshold_ms();
        let mut rng = RandomSequencer::new(seed);

        let mut source = beatmap.hit_objects.clone();
        source.sort_by_key(|obj| (obj.start_time(), obj.column()));

        let mut remapped = Vec::with_capacity(source.len() * to / from.max(1));
        let mut area: Vec<&[HitObject]> = Vec::new();
        let mut previous_duplicates: Vec<Option<i32>> = vec![None; to];
        let mut elapsed = 0i64;
        let mut last_time = 0i64;
        let mut areas = 0usize;

        let groups = time_groups(&source);
        let group_count = groups.len();
        for (index, group) in groups.into_iter().enumerate() {
            let start = i64::from(group[0].start_time());
            elapsed += start - last_time;
            last_time = start;
            area.push(group);

            if elapsed as f64 >= threshold || index + 1 == group_count {
                elapsed = 0;
                areas += 1;
                let mapping = AreaMapping::roll(&mut rng, from, to, blank);
                tracing::debug!(
                    area = areas,
                    groups = area.len(),
                    copy = ?mapping.copy,
                    insert = ?mapping.insert,
                    "flushing area"
                );
                previous_duplicates = self.process_area(
                    &area,
                    &mapping,
                    &layout,
                    timing.as_ref(),
                    &previous_duplicates,
                    &mut remapped,
                );
                area.clear();
            }
        }

        remapped.sort_by_key(HitObject::start_time);
        let mut cleaned = clean_columns(&remapped, to);
        cleaned.sort_by_key(HitObject::start_time);

        tracing::info!(
            from,
            to,
            blank,
            areas,
            notes_in = source.len(),
            notes_out = cleaned.len(),
            %seed,
            "converted key count"
        );

        beatmap.key_count = to;
        beatmap.hit_objects = cleaned;
        let tag = if blank == 0 {
            format!("[{from}To{to}C]")
        } else {
            format!("[{from}To{to}C{blank}B]")
        };
        beatmap.push_difficulty_tag(&tag);
        beatmap.credit(TOOL_NAME, self.params.creator.as_deref());
        Ok(())
    }

    /// Maps every note of an area and returns, per output column, the start
    /// time of the last duplicate it received.
    fn process_area(
        &self,
        area: &[&[HitObject]],
        mapping: &AreaMapping,
        layout: &ColumnLayout,
        timing: Option<&TimingIndex>,
        previous_duplicates: &[Option<i32>],
        out: &mut Vec<HitObject>,
    ) -> Vec<Option<i32>> {
        let mut duplicates = vec![None; layout.keys()];

        let mut mapped = Vec::with_capacity(2);
        for (index, group) in area.iter().enumerate() {
            for note in group.iter() {
                mapped.clear();
                let duplicate = mapping.map_note(note, layout, &mut mapped);
                if index == 0 {
                    mapped.retain(|note| {
                        !crowds_previous_duplicate(
                            note,
                            previous_duplicates,
                            self.params.clean,
                            timing,
                        )
                    });
                }
                // Inserted lanes never receive shifted notes.
                if let Some(column) = duplicate {
                    if mapped.iter().any(|kept| kept.column() == column) {
                        duplicates[column] = Some(note.start_time());
                    }
                }
                out.append(&mut mapped);
            }
        }

        duplicates
    }
}

/// Whether `note` falls too close behind a duplicate the previous area put in
/// its column. A clean divisor of 0 removes every such note.
fn crowds_previous_duplicate(
    note: &HitObject,
    previous_duplicates: &[Option<i32>],
    clean: u32,
    timing: Option<&TimingIndex>,
) -> bool {
    let Some(Some(duplicate_time)) = previous_duplicates.get(note.column()) else {
        return false;
    };

    match timing {
        Some(timing) if clean > 0 => {
            let start = note.start_time();
            let window = timing.grid_unit(f64::from(start), f64::from(clean)) + CLEAN_TOLERANCE_MS;
            f64::from(start - duplicate_time) < window
        }
        _ => true,
    }
}

/// Per output column, drops notes nested inside an earlier note and merges
/// notes that follow too closely. Input must be sorted by start time.
pub fn clean_columns(notes: &[HitObject], keys: usize) -> Vec<HitObject> {
    let mut columns: Vec<Vec<HitObject>> = vec![Vec::new(); keys];
    for note in notes {
        if let Some(column) = columns.get_mut(note.column()) {
            column.push(note.clone());
        }
    }

    let mut cleaned = Vec::with_capacity(notes.len());
    for column in columns {
        let mut kept: Vec<HitObject> = Vec::with_capacity(column.len());
        for note in column {
            let Some(prev) = kept.last_mut() else {
                kept.push(note);
                continue;
            };

            let start = note.start_time();
            if start >= prev.start_time() && start <= prev.end_time() {
                continue;
            }
            let close_after_start = start - prev.start_time() <= MERGE_INTERVAL_MS;
            let close_after_hold =
                prev.is_hold() && start - prev.end_time() <= HOLD_MERGE_INTERVAL_MS;
            if close_after_start || close_after_hold {
                *prev = prev.with_end_time(note.end_time());
                continue;
            }
            kept.push(note);
        }
        cleaned.extend(kept);
    }
    cleaned
}
