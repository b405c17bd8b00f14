//! Categorical color lookup for label volumes.

use std::collections::HashMap;

use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct ColorEntry {
    pub value: i64,
    pub name: String,
    /// Red, green, blue and alpha in `[0, 1]`.
    pub rgba: [f32; 4],
}

/// Ordered mapping from label value to color.
///
/// Lookups of unknown labels fall back to the last registered entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorTable {
    entries: Vec<ColorEntry>,
    positions: HashMap<i64, usize>,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label. Re-registering a value replaces its color in place.
    pub fn add(&mut self, value: i64, name: impl Into<String>, rgba: [f32; 4]) {
        let entry = ColorEntry {
            value,
            name: name.into(),
            rgba,
        };
        match self.positions.get(&value) {
            Some(&position) => self.entries[position] = entry,
            None => {
                self.positions.insert(value, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, value: i64) -> Option<&ColorEntry> {
        self.positions.get(&value).map(|&p| &self.entries[p])
    }

    pub fn entries(&self) -> &[ColorEntry] {
        &self.entries
    }

    /// Entry for `floor(scalar)`, or the last registered entry if absent.
    pub fn lookup(&self, scalar: f32) -> Option<&ColorEntry> {
        self.get(scalar.floor() as i64).or_else(|| self.entries.last())
    }

    /// RGBA bytes for a scalar; an empty table yields transparent black.
    #[inline]
    pub fn rgba_bytes(&self, scalar: f32) -> [u8; 4] {
        match self.lookup(scalar) {
            Some(entry) => entry.rgba.map(|channel| (255.0 * channel) as u8),
            None => [0; 4],
        }
    }

    /// Parse a color table in the `value name r g b a` text format.
    ///
    /// Channels are integers in `0..=255`. Comment lines starting with `#`
    /// and lines that do not hold exactly six fields are skipped.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::new();

        for line in text.lines().map(str::trim) {
            if line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [value, name, r, g, b, a] = fields.as_slice() else {
                continue;
            };

            let parsed = (
                value.parse::<i64>(),
                [r, g, b, a].map(|channel| channel.parse::<u8>()),
            );
            match parsed {
                (Ok(value), [Ok(r), Ok(g), Ok(b), Ok(a)]) => {
                    let rgba = [r, g, b, a].map(|channel| f32::from(channel) / 255.0);
                    table.add(value, *name, rgba);
                }
                _ => warn!("skipping malformed color table line '{line}'"),
            }
        }

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LUT: &str = "# label table\n\
                       0 background 0 0 0 0\n\
                       1 liver 255 0 0 255\n\
                       \n\
                       2   kidney  0 255 0 128\n\
                       3 broken\n\
                       4 spleen 0 0 300 255\n";

    #[test]
    fn parses_rows() {
        let table = ColorTable::parse(LUT);
        assert_eq!(table.len(), 3);
        let kidney = table.get(2).unwrap();
        assert_eq!(kidney.name, "kidney");
        assert_eq!(kidney.rgba, [0.0, 1.0, 0.0, 128.0 / 255.0]);
        assert!(table.get(4).is_none());
    }

    #[test]
    fn lookup_floors_scalar() {
        let table = ColorTable::parse(LUT);
        assert_eq!(table.lookup(1.9).unwrap().name, "liver");
        assert_eq!(table.rgba_bytes(1.0), [255, 0, 0, 255]);
    }

    #[test]
    fn unknown_label_falls_back_to_last_entry() {
        let mut table = ColorTable::new();
        table.add(7, "seven", [0.0, 0.0, 1.0, 1.0]);
        table.add(3, "three", [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(table.lookup(42.0).unwrap().name, "three");
        assert_eq!(table.rgba_bytes(-5.0), [255, 255, 0, 255]);
    }

    #[test]
    fn re_adding_keeps_position() {
        let mut table = ColorTable::new();
        table.add(1, "a", [0.0; 4]);
        table.add(2, "b", [0.0; 4]);
        table.add(1, "c", [1.0; 4]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[0].name, "c");
        assert_eq!(table.lookup(9.0).unwrap().name, "b");
    }

    #[test]
    fn empty_table_is_transparent() {
        assert_eq!(ColorTable::new().rgba_bytes(1.0), [0, 0, 0, 0]);
    }
}
