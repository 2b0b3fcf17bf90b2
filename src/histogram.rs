use std::collections::BTreeMap;

use crate::color::Color;

/// A distinct color and the number of pixels that carried exactly that color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramEntry {
    pub color: Color,
    pub count: u32,
}

/// A 2-D color surface: integer dimensions plus a per-coordinate color accessor.
///
/// The quantization engine consumes surfaces; it never touches files or
/// sockets itself. Decoded images implement this via [`image::RgbImage`];
/// tests implement it over flat in-memory buffers.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn color_at(&self, x: u32, y: u32) -> Color;
}

impl Surface for image::RgbImage {
    fn width(&self) -> u32 {
        image::RgbImage::width(self)
    }

    fn height(&self) -> u32 {
        image::RgbImage::height(self)
    }

    fn color_at(&self, x: u32, y: u32) -> Color {
        let p = self.get_pixel(x, y);
        Color {
            r: p[0],
            g: p[1],
            b: p[2],
        }
    }
}

/// The set of distinct colors in a surface with per-color pixel counts.
///
/// Accumulation goes through a `BTreeMap` keyed by color, so the frozen
/// entry slice is always sorted by channel value. Downstream scan order
/// (and with it assignment tie-breaking) never depends on hash-map
/// iteration order.
#[derive(Debug, Clone)]
pub struct Histogram {
    entries: Vec<HistogramEntry>,
}

impl Histogram {
    /// Count every pixel of `surface` exactly once. O(W·H).
    pub fn from_surface(surface: &impl Surface) -> Self {
        let mut counts: BTreeMap<Color, u32> = BTreeMap::new();
        for y in 0..surface.height() {
            for x in 0..surface.width() {
                *counts.entry(surface.color_at(x, y)).or_insert(0) += 1;
            }
        }

        Self {
            entries: counts
                .into_iter()
                .map(|(color, count)| HistogramEntry { color, count })
                .collect(),
        }
    }

    /// Entries sorted by color key, unique by color.
    pub fn entries(&self) -> &[HistogramEntry] {
        &self.entries
    }

    /// Number of distinct colors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all occurrence counts; equals the surface's pixel count.
    pub fn total_count(&self) -> u64 {
        self.entries.iter().map(|e| e.count as u64).sum()
    }
}
