use crate::error::QuantizeError;

/// 24-bit sRGB color, the pixel vocabulary for the whole crate.
pub type Color = rgb::RGB<u8>;

/// Default color for degenerate centroid slots and empty clusters.
pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

/// Render a color as its canonical uppercase hex form, `#RRGGBB`.
///
/// Two colors are equal exactly when their hex renderings are equal.
pub fn to_hex(color: Color) -> String {
    format!("#{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

/// Parse a `#RRGGBB` hex string back into a [`Color`].
///
/// Accepts upper- or lowercase digits; the leading `#` is required.
pub fn parse_hex(s: &str) -> Result<Color, QuantizeError> {
    let digits = s
        .strip_prefix('#')
        .filter(|d| d.len() == 6 && d.bytes().all(|b| b.is_ascii_hexdigit()))
        .ok_or_else(|| QuantizeError::MalformedHex(s.into()))?;

    let channel = |range: core::ops::Range<usize>| {
        // validated above, cannot fail
        u8::from_str_radix(&digits[range], 16).unwrap_or(0)
    };

    Ok(Color {
        r: channel(0..2),
        g: channel(2..4),
        b: channel(4..6),
    })
}

/// Squared Euclidean distance between two colors in RGB space.
///
/// Channel deltas are computed independently and summed; max value
/// is `3 * 255^2`, well within `i32`.
pub fn distance_sq(a: Color, b: Color) -> i32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    dr * dr + dg * dg + db * db
}
