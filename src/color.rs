//! Highlight color palette
//!
//! Annotation colors in a document are arbitrary device colors. Viewers only
//! know four highlight colors, so every sample is bucketed into the palette
//! by ordered threshold rules. The reverse direction writes one fixed
//! representative per palette entry, which is lossy on purpose.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The viewer's highlight palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Red,
}

impl HighlightColor {
    pub const ALL: [HighlightColor; 4] = [
        HighlightColor::Yellow,
        HighlightColor::Green,
        HighlightColor::Blue,
        HighlightColor::Red,
    ];

    /// Representative RGB triple written into exported annotations
    pub fn to_rgb(self) -> [f32; 3] {
        match self {
            HighlightColor::Yellow => [1.0, 1.0, 0.0],
            HighlightColor::Green => [0.0, 1.0, 0.0],
            HighlightColor::Blue => [0.0, 0.5, 1.0],
            HighlightColor::Red => [1.0, 0.0, 0.0],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Green => "green",
            HighlightColor::Blue => "blue",
            HighlightColor::Red => "red",
        }
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw color read from an annotation: 0 (none), 1 (gray), 3 (RGB) or 4 (CMYK) components
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorSample {
    pub n: usize,
    pub components: [f32; 4],
}

impl ColorSample {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            n: 3,
            components: [r, g, b, 0.0],
        }
    }

    /// Build from a component slice, keeping at most four entries
    pub fn from_slice(values: &[f32]) -> Self {
        let mut components = [0.0; 4];
        let n = values.len().min(4);
        components[..n].copy_from_slice(&values[..n]);
        Self { n, components }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.components[..self.n.min(4)]
    }
}

impl From<HighlightColor> for ColorSample {
    fn from(color: HighlightColor) -> Self {
        let [r, g, b] = color.to_rgb();
        ColorSample::rgb(r, g, b)
    }
}

/// Bucket a color sample into the highlight palette
///
/// Fewer than three components (no color, gray) always yields yellow. With
/// three or more, the first three are read as `(r, g, b)` and the rules are
/// tried in order; the first match wins.
pub fn classify(sample: &ColorSample) -> HighlightColor {
    if sample.n < 3 {
        return HighlightColor::Yellow;
    }

    let [r, g, b, _] = sample.components;

    if r > 0.7 && g > 0.7 && b < 0.5 {
        return HighlightColor::Yellow;
    }
    if g > 0.6 && g > r && g > b {
        return HighlightColor::Green;
    }
    if b > 0.5 && b > r {
        return HighlightColor::Blue;
    }
    if r > 0.6 && r > g && r > b {
        return HighlightColor::Red;
    }

    HighlightColor::Yellow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_idempotent() {
        for color in HighlightColor::ALL {
            assert_eq!(classify(&ColorSample::from(color)), color);
        }
    }

    #[test]
    fn test_green_sample() {
        assert_eq!(classify(&ColorSample::rgb(0.1, 0.9, 0.1)), HighlightColor::Green);
    }

    #[test]
    fn test_missing_or_gray_defaults_to_yellow() {
        assert_eq!(classify(&ColorSample::none()), HighlightColor::Yellow);
        assert_eq!(classify(&ColorSample::from_slice(&[0.2])), HighlightColor::Yellow);
    }

    #[test]
    fn test_rule_precedence() {
        // yellow rule wins over red for orange-ish yellows
        assert_eq!(classify(&ColorSample::rgb(0.9, 0.8, 0.1)), HighlightColor::Yellow);
        // cyan: green beats blue because the green rule is tried first
        assert_eq!(classify(&ColorSample::rgb(0.0, 0.9, 0.8)), HighlightColor::Green);
        assert_eq!(classify(&ColorSample::rgb(0.2, 0.4, 0.9)), HighlightColor::Blue);
        assert_eq!(classify(&ColorSample::rgb(0.9, 0.2, 0.3)), HighlightColor::Red);
        // dark colors fall through
        assert_eq!(classify(&ColorSample::rgb(0.2, 0.2, 0.2)), HighlightColor::Yellow);
    }

    #[test]
    fn test_cmyk_reads_first_three_components() {
        let sample = ColorSample::from_slice(&[0.1, 0.9, 0.1, 0.0]);
        assert_eq!(sample.n, 4);
        assert_eq!(classify(&sample), HighlightColor::Green);
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&HighlightColor::Red).unwrap();
        assert_eq!(json, "\"red\"");
    }
}
