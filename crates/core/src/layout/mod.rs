use crate::{Result, ToolkitError};

/// Width of the playfield in legacy osu! pixels.
pub const PLAYFIELD_WIDTH: i32 = 512;

/// Largest key count with a column table.
pub const MAX_LAYOUT_KEYS: usize = 10;

const KEYS_1: &[i32] = &[256];
const KEYS_2: &[i32] = &[128, 384];
const KEYS_3: &[i32] = &[85, 256, 426];
const KEYS_4: &[i32] = &[64, 192, 320, 448];
const KEYS_5: &[i32] = &[51, 153, 256, 358, 460];
const KEYS_6: &[i32] = &[42, 128, 213, 298, 384, 469];
const KEYS_7: &[i32] = &[36, 109, 182, 256, 329, 402, 475];
const KEYS_8: &[i32] = &[32, 96, 160, 224, 288, 352, 416, 480];
const KEYS_9: &[i32] = &[28, 85, 142, 199, 256, 312, 369, 426, 483];
const KEYS_10: &[i32] = &[25, 76, 128, 179, 230, 281, 332, 384, 435, 486];

/// Read-only table of column centre `x` coordinates for one key count.
///
/// Charts store a note's column through the legacy pixel `x` field. Reading
/// uses `floor(x * K / 512)`; writing uses the table, so every table entry
/// maps back onto its own column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    keys: usize,
    centres: &'static [i32],
}

impl ColumnLayout {
    /// Returns the layout for `keys` columns.
    pub fn for_keys(keys: usize) -> Result<Self> {
        let centres = match keys {
            1 => KEYS_1,
            2 => KEYS_2,
            3 => KEYS_3,
            4 => KEYS_4,
            5 => KEYS_5,
            6 => KEYS_6,
            7 => KEYS_7,
            8 => KEYS_8,
            9 => KEYS_9,
            10 => KEYS_10,
            _ => {
                return Err(ToolkitError::validation(format!(
                    "no column layout for {keys} keys"
                )))
            }
        };

        Ok(Self { keys, centres })
    }

    pub fn keys(&self) -> usize {
        self.keys
    }

    /// Centre `x` of `column`. Columns past the last lane are pinned to it.
    pub fn x_of(&self, column: usize) -> i32 {
        self.centres[column.min(self.keys - 1)]
    }

    /// Column that contains the pixel coordinate `x`.
    pub fn column_of(&self, x: i32) -> usize {
        let raw = (i64::from(x.max(0)) * self.keys as i64) / i64::from(PLAYFIELD_WIDTH);
        (raw as usize).min(self.keys - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_centre_maps_back_to_its_column() {
        for keys in 1..=MAX_LAYOUT_KEYS {
            let layout = ColumnLayout::for_keys(keys).unwrap();
            for column in 0..keys {
                assert_eq!(layout.column_of(layout.x_of(column)), column, "{keys}K col {column}");
            }
        }
    }

    #[test]
    fn table_matches_centre_formula() {
        for keys in 1..=MAX_LAYOUT_KEYS {
            let layout = ColumnLayout::for_keys(keys).unwrap();
            for column in 0..keys {
                let expected = ((column as f64 + 0.5) * 512.0 / keys as f64).floor() as i32;
                assert_eq!(layout.x_of(column), expected);
            }
        }
    }

    #[test]
    fn off_centre_coordinates_resolve_to_their_lane() {
        let layout = ColumnLayout::for_keys(4).unwrap();
        assert_eq!(layout.column_of(0), 0);
        assert_eq!(layout.column_of(127), 0);
        assert_eq!(layout.column_of(128), 1);
        assert_eq!(layout.column_of(511), 3);
        assert_eq!(layout.column_of(600), 3);
    }

    #[test]
    fn rejects_unsupported_key_counts() {
        assert!(ColumnLayout::for_keys(0).is_err());
        assert!(ColumnLayout::for_keys(11).is_err());
    }
}
