//! Tap/hold density transformation.
//!
//! Each column is walked in time order and every note may be stretched into a
//! hold that ends before the next note of the same column. How long the hold
//! is depends on the level: a uniform draw, a grid multiple, a normal draw
//! around a fraction of the free gap, or the inverse of the gap. A second pass
//! keeps holds only in a rotating subset of columns.

use crate::{
    timing::{snap_to_grid, snap_to_unit},
    Beatmap, HitObject, HoldNoteParams, RandomSequencer, Result, Seed, TimingIndex, ToolkitError,
};

/// Name credited in the creator field.
pub const TOOL_NAME: &str = "LNTransformer";
pub const MIN_LEVEL: i32 = -3;
pub const MAX_LEVEL: i32 = 10;

/// A hold ending this close to the next note is not converted.
const FULL_GAP_TOLERANCE_MS: f64 = 2.0;
/// Minimum release time before the next note for inverted holds.
const INVERT_MARGIN_MS: f64 = 3.0;

/// Whether this transformer already processed `beatmap`: its creator credits
/// the tool or its difficulty name carries an `[LN...]` tag.
pub fn is_already_converted(beatmap: &Beatmap) -> bool {
    let version = &beatmap.metadata.version;
    beatmap.metadata.creator.contains(TOOL_NAME)
        || version
            .find("[LN")
            .is_some_and(|at| version[at + 3..].contains(']'))
}

/// Distribution of a single hold duration.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Draw {
    /// A uniformly chosen multiple of the grid unit.
    GridMultiple,
    /// Normal around `mean_percent` of the free gap with `sigma = unit / sigma_divisor`.
    Normal { mean_percent: f64, sigma_divisor: f64 },
}

impl Draw {
    fn for_level(level: i32) -> Option<Self> {
        let (mean_percent, sigma_divisor) = match level {
            -1 => return Some(Self::GridMultiple),
            0 => (1.0, 100.0),
            8 => (88.0, 0.9),
            9 => (99.0, 1.0),
            1..=7 => (f64::from(level) * 11.0, 0.85),
            _ => return None,
        };
        Some(Self::Normal {
            mean_percent,
            sigma_divisor,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DurationModel {
    /// Strip holds, then randomly force notes in the active columns to taps.
    Retap,
    /// Uniform duration across the free gap, unsnapped.
    Uniform,
    Drawn(Draw),
    /// Hold until one grid unit before the next note.
    Invert,
}

impl DurationModel {
    fn for_level(level: i32) -> Result<Self> {
        match level {
            -3 => Ok(Self::Retap),
            -2 => Ok(Self::Uniform),
            10 => Ok(Self::Invert),
            _ => Draw::for_level(level).map(Self::Drawn).ok_or_else(|| {
                ToolkitError::validation(format!(
                    "level {level} outside {MIN_LEVEL}..={MAX_LEVEL}"
                ))
            }),
        }
    }
}

/// Clamps a snapped duration into `[unit, full - unit]`, rounding the upper
/// bound down to a whole number of units. Fails when the result would end within 2ms of the next note.
pub fn clamp_duration(duration: f64, unit: f64, full: f64) -> Result<f64> {
    let mut duration = duration;
    if duration > full - unit {
        duration = ((full - unit) / unit).floor() * unit;
    }
    if duration <= unit {
        duration = unit;
    }
    if duration >= full - FULL_GAP_TOLERANCE_MS {
        return Err(ToolkitError::Constraint(format!(
            "{duration:.1}ms hold does not fit a {full:.1}ms gap"
        )));
    }
    Ok(duration)
}

/// Random subset of columns that is re-rolled every `window` time-groups.
#[derive(Debug)]
struct ColumnRotation {
    keys: usize,
    size: usize,
    window: usize,
    remaining: usize,
    active: Vec<bool>,
}

impl ColumnRotation {
    /// `columns` of 0, or more than `keys`, activates every column. A
    /// `window` of 0 never re-rolls.
    fn new(rng: &mut RandomSequencer, keys: usize, columns: usize, window: usize) -> Self {
        let size = if columns == 0 { keys } else { columns.min(keys) };
        let mut rotation = Self {
            keys,
            size,
            window,
            remaining: window,
            active: Vec::new(),
        };
        rotation.reroll(rng);
        rotation
    }

    fn reroll(&mut self, rng: &mut RandomSequencer) {
        self.active = vec![false; self.keys];
        for column in rng.distinct(self.keys, self.size) {
            self.active[column] = true;
        }
    }

    fn contains(&self, column: usize) -> bool {
        self.active.get(column).copied().unwrap_or(false)
    }

    /// Called once after every time-group.
    fn advance(&mut self, rng: &mut RandomSequencer) {
        if self.window == 0 {
            return;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.reroll(rng);
            self.remaining = self.window;
        }
    }
}

/// A transformed note and whether it is a preserved original hold.
#[derive(Debug, Clone)]
struct Placed {
    note: HitObject,
    original: bool,
}

/// Result of [`HoldNoteTransformer::transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldOutcome {
    Converted,
    /// Skipped because the chart already carries this transformer's marks.
    AlreadyConverted,
}

/// Converts taps to holds (and back) in mania charts.
#[derive(Debug, Clone)]
pub struct HoldNoteTransformer {
    params: HoldNoteParams,
}

impl HoldNoteTransformer {
    pub fn new(params: HoldNoteParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HoldNoteParams {
        &self.params
    }

    pub fn validate(&self, beatmap: &Beatmap) -> Result<()> {
        if !beatmap.is_mania() {
            return Err(ToolkitError::validation("not a mania chart"));
        }
        let keys = beatmap.key_count;
        if !self.params.allowed_keys.is_empty() && !self.params.allowed_keys.contains(&keys) {
            return Err(ToolkitError::validation(format!(
                "{keys}K charts are excluded from conversion"
            )));
        }
        DurationModel::for_level(self.params.level)?;
        if !is_positive(self.params.divide) {
            return Err(ToolkitError::validation(format!(
                "beat divisor must be positive, got {}",
                self.params.divide
            )));
        }
        if let Some(blend) = &self.params.blend {
            if !is_positive(blend.divide) {
                return Err(ToolkitError::validation(format!(
                    "blend beat divisor must be positive, got {}",
                    blend.divide
                )));
            }
            if Draw::for_level(blend.level).is_none() {
                return Err(ToolkitError::validation(format!(
                    "blend level {} outside -1..=9",
                    blend.level
                )));
            }
        }
        Ok(())
    }

    /// Transforms `beatmap` in place with the given seed.
    pub fn transform(&self, beatmap: &mut Beatmap, seed: Seed) -> Result<HoldOutcome> {
        self.validate(beatmap)?;
        if self.params.skip_converted && is_already_converted(beatmap) {
            tracing::info!(
                difficulty = %beatmap.metadata.version,
                "skipping chart that is already converted"
            );
            return Ok(HoldOutcome::AlreadyConverted);
        }

        let model = DurationModel::for_level(self.params.level)?;
        let keys = beatmap.key_count;
        let mut rng = RandomSequencer::new(seed);
        let mut source = beatmap.hit_objects.clone();
        source.sort_by_key(HitObject::start_time);
        let holds_before = beatmap.hold_count();

        let mut notes = match model {
            DurationModel::Retap => self.retap(&source, keys, &mut rng),
            _ => {
                let timing = match model {
                    DurationModel::Uniform => None,
                    _ => Some(TimingIndex::new(&beatmap.timing_points)?),
                };
                let mut placed = Vec::with_capacity(source.len());
                for column in split_columns(&source, keys) {
                    self.transform_column(model, &column, timing.as_ref(), &mut rng, &mut placed);
                }
                placed.sort_by_key(|p| p.note.start_time());
                self.redistribute(placed, keys, &mut rng)
            }
        };
        notes.sort_by_key(HitObject::start_time);

        beatmap.hit_objects = notes;
        if let Some(od) = self.params.overall_difficulty {
            beatmap.difficulty.overall_difficulty = od;
        }
        let columns = self.params.columns.min(keys);
        let tag = if columns == 0 {
            format!("[LN-Lv{}]", self.params.level)
        } else {
            format!("[LN-Lv{}-C{columns}]", self.params.level)
        };
        beatmap.push_difficulty_tag(&tag);
        beatmap.credit(TOOL_NAME, self.params.creator.as_deref());

        tracing::info!(
            level = self.params.level,
            keys,
            notes = beatmap.hit_objects.len(),
            holds_before,
            holds_after = beatmap.hold_count(),
            %seed,
            "transformed holds"
        );
        Ok(HoldOutcome::Converted)
    }

    fn retap(&self, source: &[HitObject], keys: usize, rng: &mut RandomSequencer) -> Vec<HitObject> {
        let mut rotation = ColumnRotation::new(rng, keys, self.params.columns, self.params.window);
        let mut out = Vec::with_capacity(source.len());

        for (index, note) in source.iter().enumerate() {
            // Existing holds are stripped at this level even when preserved.
            let base = note.to_tap();
            if rotation.contains(note.column()) && rng.chance(self.params.percent) {
                out.push(base.to_tap());
            } else {
                out.push(base);
            }
            if ends_group(source, index) {
                rotation.advance(rng);
            }
        }
        out
    }

    /// Processes one column in time order. The last note has no following
    /// note to bound it and is never stretched.
    fn transform_column(
        &self,
        model: DurationModel,
        column: &[HitObject],
        timing: Option<&TimingIndex>,
        rng: &mut RandomSequencer,
        out: &mut Vec<Placed>,
    ) {
        let Some((last, body)) = column.split_last() else {
            return;
        };

        for (note, next) in body.iter().zip(column.iter().skip(1)) {
            if self.params.preserve_holds && note.is_hold() {
                out.push(Placed {
                    note: note.clone(),
                    original: true,
                });
                continue;
            }

            let converted = if rng.chance(self.params.percent) {
                match self.hold_end(model, note, next, timing, rng) {
                    Ok(end) => note.with_end_time(end),
                    Err(err) => {
                        tracing::trace!(start = note.start_time(), column = note.column(), %err, "kept as tap");
                        note.to_tap()
                    }
                }
            } else {
                note.to_tap()
            };
            out.push(Placed {
                note: converted,
                original: false,
            });
        }

        let placed = if self.params.preserve_holds && last.is_hold() {
            Placed {
                note: last.clone(),
                original: true,
            }
        } else if matches!(model, DurationModel::Drawn(_))
            && last.is_hold()
            && rng.chance(self.params.percent)
        {
            Placed {
                note: last.clone(),
                original: false,
            }
        } else {
            Placed {
                note: last.to_tap(),
                original: false,
            }
        };
        out.push(placed);
    }

    /// End time of the hold starting at `note`, bounded by `next`.
    fn hold_end(
        &self,
        model: DurationModel,
        note: &HitObject,
        next: &HitObject,
        timing: Option<&TimingIndex>,
        rng: &mut RandomSequencer,
    ) -> Result<i32> {
        let start = f64::from(note.start_time());
        let full = f64::from(next.start_time() - note.start_time());

        let duration = match (model, timing) {
            (DurationModel::Uniform, _) => {
                let whole = rng.below(full.max(0.0) as usize) as f64;
                return Ok(note.start_time() + (whole + rng.unit()) as i32);
            }
            (DurationModel::Drawn(draw), Some(timing)) => {
                self.drawn_duration(draw, start, full, timing, rng)?
            }
            (DurationModel::Invert, Some(timing)) => {
                let unit = timing.grid_unit(f64::from(next.start_time()), self.params.divide);
                let duration = (full - unit).max(unit);
                if duration > full - INVERT_MARGIN_MS {
                    return Err(ToolkitError::Constraint(format!(
                        "inverted hold leaves under {INVERT_MARGIN_MS}ms before the next note"
                    )));
                }
                duration
            }
            _ => return Err(ToolkitError::NoTimingData),
        };

        let mut end = start + duration;
        if self.params.fix_grid_error {
            if let Some(timing) = timing {
                end = snap_to_grid(end, timing.active_point(end), self.params.divide);
                if end <= start || end >= f64::from(next.start_time()) - FULL_GAP_TOLERANCE_MS {
                    return Err(ToolkitError::Constraint(
                        "grid correction moved the hold end out of its gap".to_string(),
                    ));
                }
            }
        }
        Ok(end as i32)
    }

    fn drawn_duration(
        &self,
        draw: Draw,
        start: f64,
        full: f64,
        timing: &TimingIndex,
        rng: &mut RandomSequencer,
    ) -> Result<f64> {
        let (draw, divide) = match &self.params.blend {
            Some(blend) if !rng.chance(blend.mix) => match Draw::for_level(blend.level) {
                Some(secondary) => (secondary, blend.divide),
                None => (draw, self.params.divide),
            },
            _ => (draw, self.params.divide),
        };
        let unit = timing.grid_unit(start, divide);

        let duration = match draw {
            Draw::GridMultiple => {
                let count = (full / unit).floor().max(0.0) as usize;
                if count <= 1 {
                    unit
                } else {
                    rng.between(1, count) as f64 * unit
                }
            }
            Draw::Normal {
                mean_percent,
                sigma_divisor,
            } => {
                let mean = full * mean_percent / 100.0;
                snap_to_unit(rng.gaussian(mean, unit / sigma_divisor), unit)
            }
        };
        clamp_duration(duration, unit, full)
    }

    /// Keeps holds only in the active columns, re-rolled every `window`
    /// time-groups. Preserved originals always survive.
    fn redistribute(
        &self,
        placed: Vec<Placed>,
        keys: usize,
        rng: &mut RandomSequencer,
    ) -> Vec<HitObject> {
        let mut rotation = ColumnRotation::new(rng, keys, self.params.columns, self.params.window);
        let starts: Vec<i32> = placed.iter().map(|p| p.note.start_time()).collect();
        let mut out = Vec::with_capacity(placed.len());

        for (index, Placed { note, original }) in placed.into_iter().enumerate() {
            let keep = (original && self.params.preserve_holds)
                || (rotation.contains(note.column()) && note.is_hold());
            out.push(if keep { note } else { note.to_tap() });

            if starts.get(index + 1) != Some(&starts[index]) {
                rotation.advance(rng);
            }
        }
        out
    }
}

/// Notes of each column in time order, columns ascending.
fn split_columns(notes: &[HitObject], keys: usize) -> Vec<Vec<HitObject>> {
    let lanes = notes
        .iter()
        .map(|n| n.column() + 1)
        .max()
        .unwrap_or(0)
        .max(keys);
    let mut columns = vec![Vec::new(); lanes];
    for note in notes {
        columns[note.column()].push(note.clone());
    }
    columns
}

fn is_positive(divisor: f64) -> bool {
    divisor.is_finite() && divisor > 0.0
}

fn ends_group(notes: &[HitObject], index: usize) -> bool {
    notes
        .get(index + 1)
        .map_or(true, |next| next.start_time() != notes[index].start_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{codec::fixtures::chart, BlendProfile, TimingPoint};

    fn params(level: i32) -> HoldNoteParams {
        HoldNoteParams {
            level,
            ..Default::default()
        }
    }

    /// Four columns of quarter notes at 120 BPM, staggered by column.
    fn stream() -> Beatmap {
        let notes: Vec<(usize, i32, i32)> = (0..64)
            .map(|i| ((i % 4) as usize, 1000 + i * 125, 1000 + i * 125))
            .collect();
        chart(4, 500.0, &notes)
    }

    fn column_gaps_hold(map: &Beatmap) -> bool {
        (0..map.key_count).all(|column| {
            let lane: Vec<&HitObject> = map.hit_objects.iter().filter(|n| n.column() == column).collect();
            lane.windows(2).all(|w| w[0].end_time() < w[1].start_time())
        })
    }

    #[test]
    fn invert_leaves_one_unit_before_next_note() {
        let mut map = chart(4, 400.0, &[(0, 0, 0), (0, 500, 500)]);
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            divide: 4.0,
            ..params(10)
        });
        transformer.transform(&mut map, Seed(1)).unwrap();

        assert_eq!(map.hit_objects[0].start_time(), 0);
        assert_eq!(map.hit_objects[0].end_time(), 400);
        assert!(!map.hit_objects[1].is_hold());
    }

    #[test]
    fn invert_rejects_tight_gaps() {
        let mut map = chart(4, 400.0, &[(0, 0, 0), (0, 101, 101)]);
        HoldNoteTransformer::new(params(10))
            .transform(&mut map, Seed(1))
            .unwrap();
        assert_eq!(map.hold_count(), 0);
    }

    #[test]
    fn drawn_holds_are_grid_multiples_within_bounds() {
        for level in [-1, 0, 3, 8, 9] {
            let mut map = stream();
            let transformer = HoldNoteTransformer::new(params(level));
            transformer.transform(&mut map, Seed(42)).unwrap();

            let unit = 125.0;
            for note in map.hit_objects.iter().filter(|n| n.is_hold()) {
                let duration = f64::from(note.duration());
                assert_eq!(duration % unit, 0.0, "level {level}: {duration}");
                assert!(duration >= unit && duration <= 500.0 - unit, "level {level}: {duration}");
            }
            assert!(column_gaps_hold(&map), "level {level}");
        }
    }

    #[test]
    fn drawn_holds_fit_gaps_that_are_not_whole_units() {
        // 400ms beat split in four gives a 100ms unit; the gap is 450ms.
        for seed in 0..20 {
            let mut map = chart(4, 400.0, &[(0, 0, 0), (0, 450, 450)]);
            let transformer = HoldNoteTransformer::new(HoldNoteParams {
                divide: 4.0,
                percent: 100.0,
                ..params(9)
            });
            transformer.transform(&mut map, Seed(seed)).unwrap();
            for note in map.hit_objects.iter().filter(|n| n.is_hold()) {
                let duration = f64::from(note.duration());
                assert!(duration <= 350.0, "seed {seed}: {duration}");
                assert_eq!(duration % 100.0, 0.0, "seed {seed}: {duration}");
            }
        }
    }

    #[test]
    fn high_levels_make_holds() {
        let mut map = stream();
        HoldNoteTransformer::new(params(7)).transform(&mut map, Seed(9)).unwrap();
        // Every column body note is eligible; the last of each column stays a tap.
        assert!(map.hold_count() > 40);
        assert_eq!(map.hit_objects.len(), 64);
    }

    #[test]
    fn zero_percent_makes_only_taps() {
        let mut map = stream();
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            percent: 0.0,
            ..params(5)
        });
        transformer.transform(&mut map, Seed(9)).unwrap();
        assert_eq!(map.hold_count(), 0);
    }

    #[test]
    fn uniform_level_stays_inside_gap() {
        let mut map = stream();
        HoldNoteTransformer::new(params(-2)).transform(&mut map, Seed(4)).unwrap();
        assert_eq!(map.hit_objects.len(), 64);
        assert!(column_gaps_hold(&map));
    }

    #[test]
    fn retap_strips_holds() {
        let mut map = chart(4, 500.0, &[(0, 0, 300), (1, 0, 600), (2, 500, 500)]);
        HoldNoteTransformer::new(params(-3)).transform(&mut map, Seed(4)).unwrap();
        assert_eq!(map.hold_count(), 0);
        assert_eq!(map.hit_objects.len(), 3);
    }

    #[test]
    fn retap_strips_holds_even_when_preserving() {
        for percent in [0.0, 100.0] {
            let mut map = chart(4, 500.0, &[(0, 0, 300), (1, 0, 600), (2, 0, 0)]);
            let transformer = HoldNoteTransformer::new(HoldNoteParams {
                preserve_holds: true,
                columns: 2,
                percent,
                ..params(-3)
            });
            transformer.transform(&mut map, Seed(4)).unwrap();
            assert_eq!(map.hold_count(), 0, "percent {percent}");
            assert_eq!(map.hit_objects.len(), 3);
            assert_eq!(map.metadata.version, "[LN-Lv-3-C2]");
        }
    }

    #[test]
    fn preserved_holds_survive_redistribution() {
        let mut map = chart(4, 500.0, &[(0, 0, 200), (0, 1000, 1000), (1, 0, 0), (1, 500, 500)]);
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            preserve_holds: true,
            columns: 1,
            percent: 0.0,
            ..params(5)
        });
        transformer.transform(&mut map, Seed(3)).unwrap();
        let original = map
            .hit_objects
            .iter()
            .find(|n| n.column() == 0 && n.start_time() == 0)
            .unwrap();
        assert_eq!(original.end_time(), 200);
        assert_eq!(map.hold_count(), 1);
    }

    #[test]
    fn active_columns_limit_holds() {
        let mut map = stream();
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            columns: 1,
            ..params(7)
        });
        transformer.transform(&mut map, Seed(12)).unwrap();
        let lanes: Vec<usize> = map
            .hit_objects
            .iter()
            .filter(|n| n.is_hold())
            .map(HitObject::column)
            .collect();
        assert!(!lanes.is_empty());
        assert!(lanes.iter().all(|c| *c == lanes[0]));
        assert!(map.metadata.version.starts_with("[LN-Lv7-C1]"));
    }

    #[test]
    fn same_seed_same_output() {
        let run = |seed: Seed| {
            let mut map = stream();
            let transformer = HoldNoteTransformer::new(HoldNoteParams {
                columns: 2,
                window: 4,
                blend: Some(BlendProfile {
                    divide: 2.0,
                    level: 2,
                    mix: 50.0,
                }),
                ..params(6)
            });
            transformer.transform(&mut map, seed).unwrap();
            map
        };
        assert_eq!(run(Seed::from_phrase("x")), run(Seed::from_phrase("x")));
    }

    #[test]
    fn skips_own_output_when_asked() {
        let mut map = stream();
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            skip_converted: true,
            ..params(4)
        });
        assert_eq!(transformer.transform(&mut map, Seed(1)).unwrap(), HoldOutcome::Converted);
        assert!(is_already_converted(&map));

        let converted = map.clone();
        assert_eq!(
            transformer.transform(&mut map, Seed(2)).unwrap(),
            HoldOutcome::AlreadyConverted
        );
        assert_eq!(map, converted);
    }

    #[test]
    fn recognises_converted_charts() {
        let mut map = Beatmap::default();
        assert!(!is_already_converted(&map));
        map.metadata.version = "[LN-Lv3]Hard".to_string();
        assert!(is_already_converted(&map));
        map.metadata.version = "[LN Hard".to_string();
        assert!(!is_already_converted(&map));
        map.metadata.creator = "mapper & LNTransformer".to_string();
        assert!(is_already_converted(&map));
    }

    #[test]
    fn tags_credit_and_difficulty() {
        let mut map = stream();
        map.metadata.version = "Hard".to_string();
        map.metadata.creator = "mapper".to_string();
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            overall_difficulty: Some(7.5),
            columns: 9,
            ..params(2)
        });
        transformer.transform(&mut map, Seed(1)).unwrap();
        assert_eq!(map.metadata.version, "[LN-Lv2-C4]Hard");
        assert_eq!(map.metadata.creator, "mapper & LNTransformer");
        assert_eq!(map.difficulty.overall_difficulty, 7.5);
    }

    #[test]
    fn rejects_bad_levels_and_keys() {
        let mut map = stream();
        assert!(HoldNoteTransformer::new(params(11)).transform(&mut map, Seed(1)).is_err());
        assert!(HoldNoteTransformer::new(params(-4)).transform(&mut map, Seed(1)).is_err());

        let blend = HoldNoteParams {
            blend: Some(BlendProfile {
                divide: 4.0,
                level: 10,
                mix: 50.0,
            }),
            ..params(3)
        };
        assert!(HoldNoteTransformer::new(blend).validate(&map).is_err());

        for divide in [0.0, -4.0, f64::NAN] {
            let flat = HoldNoteParams {
                divide,
                ..params(3)
            };
            let err = HoldNoteTransformer::new(flat).validate(&map).unwrap_err();
            assert!(matches!(err, ToolkitError::Validation(_)), "{divide}");

            let flat_blend = HoldNoteParams {
                blend: Some(BlendProfile {
                    divide,
                    level: 2,
                    mix: 50.0,
                }),
                ..params(3)
            };
            let err = HoldNoteTransformer::new(flat_blend).validate(&map).unwrap_err();
            assert!(matches!(err, ToolkitError::Validation(_)), "{divide}");
        }

        let excluded = HoldNoteParams {
            allowed_keys: vec![7],
            ..params(3)
        };
        let err = HoldNoteTransformer::new(excluded).transform(&mut map, Seed(1)).unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn drawn_levels_need_timing() {
        let mut map = stream();
        map.timing_points = vec![TimingPoint {
            uninherited: false,
            ..TimingPoint::new(0.0, -100.0)
        }];
        assert!(matches!(
            HoldNoteTransformer::new(params(3)).transform(&mut map, Seed(1)),
            Err(ToolkitError::NoTimingData)
        ));
    }

    #[test]
    fn clamping_bounds_durations() {
        assert_eq!(clamp_duration(50.0, 100.0, 1000.0).unwrap(), 100.0);
        assert_eq!(clamp_duration(950.0, 100.0, 1000.0).unwrap(), 900.0);
        assert_eq!(clamp_duration(400.0, 100.0, 1000.0).unwrap(), 400.0);
        assert_eq!(clamp_duration(440.0, 100.0, 450.0).unwrap(), 300.0);
        assert_eq!(clamp_duration(350.0, 100.0, 450.0).unwrap(), 350.0);
        assert!(matches!(
            clamp_duration(100.0, 100.0, 101.0),
            Err(ToolkitError::Constraint(_))
        ));
    }

    #[test]
    fn fix_grid_snaps_to_the_point_at_the_end() {
        let mut map = chart(4, 400.0, &[(0, 0, 0), (0, 1000, 1000)]);
        map.timing_points.push(TimingPoint::new(550.0, 300.0));
        let transformer = HoldNoteTransformer::new(HoldNoteParams {
            fix_grid_error: true,
            divide: 4.0,
            ..params(10)
        });
        transformer.transform(&mut map, Seed(1)).unwrap();
        // 1000 - 300/4 = 925, already on the 75ms grid anchored at 550.
        assert_eq!(map.hit_objects[0].end_time(), 925);
    }
}
