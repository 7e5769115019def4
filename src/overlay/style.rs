//! Text style values and grouped style updates

use serde::{Deserialize, Serialize};

/// Font families offered by the style panel
pub const FONT_FAMILIES: [&str; 8] = [
    "Arial",
    "Helvetica",
    "Times New Roman",
    "Georgia",
    "Verdana",
    "Courier New",
    "Impact",
    "Comic Sans MS",
];

/// Default overlay fill color
pub const DEFAULT_COLOR: &str = "#d9dc1e";
pub const DEFAULT_FONT_SIZE: f32 = 48.0;
pub const DEFAULT_FONT_FAMILY: &str = "Arial";
/// Text given to overlays created by double-clicking the canvas
pub const DEFAULT_OVERLAY_TEXT: &str = "Double-click to edit";

/// Font weight keywords and numeric weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontWeight {
    Normal,
    Bold,
    Light,
    W100,
    W200,
    W300,
    W400,
    W500,
    W600,
    W700,
    W800,
    W900,
}

impl FontWeight {
    /// Every selectable weight, in panel order
    pub const ALL: [FontWeight; 12] = [
        Self::Normal,
        Self::Bold,
        Self::Light,
        Self::W100,
        Self::W200,
        Self::W300,
        Self::W400,
        Self::W500,
        Self::W600,
        Self::W700,
        Self::W800,
        Self::W900,
    ];

    /// Numeric CSS weight used for face selection
    #[must_use]
    pub fn numeric(self) -> u16 {
        match self {
            Self::W100 => 100,
            Self::W200 => 200,
            Self::Light | Self::W300 => 300,
            Self::Normal | Self::W400 => 400,
            Self::W500 => 500,
            Self::W600 => 600,
            Self::Bold | Self::W700 => 700,
            Self::W800 => 800,
            Self::W900 => 900,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Bold => "bold",
            Self::Light => "light",
            Self::W100 => "100",
            Self::W200 => "200",
            Self::W300 => "300",
            Self::W400 => "400",
            Self::W500 => "500",
            Self::W600 => "600",
            Self::W700 => "700",
            Self::W800 => "800",
            Self::W900 => "900",
        }
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::W700
    }
}

impl From<String> for FontWeight {
    fn from(value: String) -> Self {
        Self::ALL
            .into_iter()
            .find(|weight| weight.as_str().eq_ignore_ascii_case(value.trim()))
            .unwrap_or_else(|| {
                tracing::debug!(weight = %value, "Unknown font weight, using normal");
                Self::Normal
            })
    }
}

impl From<FontWeight> for String {
    fn from(value: FontWeight) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for FontWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Horizontal text alignment relative to the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextAlign {
    Left,
    Center,
    Right,
    Justify,
    Start,
    End,
}

/// Alignment actually applied when drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
            Self::Start => "start",
            Self::End => "end",
        }
    }

    /// Resolve to a drawable alignment
    ///
    /// Only left, right, center, start and end are drawable; everything else
    /// draws centered. Start and end resolve for left-to-right text.
    #[must_use]
    pub fn canvas_align(self) -> CanvasAlign {
        match self {
            Self::Left | Self::Start => CanvasAlign::Left,
            Self::Right | Self::End => CanvasAlign::Right,
            Self::Center | Self::Justify => CanvasAlign::Center,
        }
    }
}

impl Default for TextAlign {
    fn default() -> Self {
        Self::Center
    }
}

impl From<String> for TextAlign {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "left" => Self::Left,
            "center" => Self::Center,
            "right" => Self::Right,
            "justify" => Self::Justify,
            "start" => Self::Start,
            "end" => Self::End,
            other => {
                tracing::debug!(align = %other, "Unknown text alignment, using center");
                Self::Center
            },
        }
    }
}

impl From<TextAlign> for String {
    fn from(value: TextAlign) -> Self {
        value.as_str().to_string()
    }
}

/// Drop shadow drawn behind the glyphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shadow {
    pub color: String,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            blur: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Outline drawn around the glyphs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: String,
    pub width: f32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: "#000000".to_string(),
            width: 0.0,
        }
    }
}

/// Complete visual style of one overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_size: f32,
    pub font_family: String,
    #[serde(default)]
    pub font_weight: FontWeight,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub text_align: TextAlign,
    /// Degrees, interpreted modulo 360
    #[serde(default)]
    pub rotation: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Shadow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Stroke>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<f32>,
}

fn default_opacity() -> f32 {
    1.0
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_weight: FontWeight::W700,
            color: DEFAULT_COLOR.to_string(),
            background_color: None,
            opacity: 1.0,
            text_align: TextAlign::Center,
            rotation: 0.0,
            shadow: None,
            stroke: None,
            letter_spacing: None,
        }
    }
}

impl TextStyle {
    /// Rotation folded into `[0, 360)`
    #[must_use]
    pub fn normalized_rotation(&self) -> f32 {
        if self.rotation.is_finite() {
            self.rotation.rem_euclid(360.0)
        } else {
            0.0
        }
    }

    /// CSS-like font shorthand, e.g. `700 48px Arial`
    #[must_use]
    pub fn font_shorthand(&self) -> String {
        format!("{} {}px {}", self.font_weight, self.font_size, self.font_family)
    }

    /// Apply one grouped update, returning the new style
    ///
    /// Fields outside the update's group are carried over untouched.
    #[must_use]
    pub fn apply(&self, update: &StyleUpdate) -> TextStyle {
        let mut style = self.clone();
        match update {
            StyleUpdate::Font(font) => {
                if let Some(family) = &font.family {
                    style.font_family.clone_from(family);
                }
                if let Some(size) = font.size {
                    if size.is_finite() && size > 0.0 {
                        style.font_size = size;
                    } else {
                        tracing::debug!(size, "Ignoring non-positive font size");
                    }
                }
                if let Some(weight) = font.weight {
                    style.font_weight = weight;
                }
            },
            StyleUpdate::Fill(fill) => {
                if let Some(color) = &fill.color {
                    style.color.clone_from(color);
                }
                if let Some(background) = &fill.background_color {
                    style.background_color.clone_from(background);
                }
                if let Some(opacity) = fill.opacity {
                    style.opacity = if opacity.is_finite() {
                        opacity.clamp(0.0, 1.0)
                    } else {
                        style.opacity
                    };
                }
            },
            StyleUpdate::Shadow(patch) => {
                let mut shadow = style.shadow.take().unwrap_or_default();
                if let Some(color) = &patch.color {
                    shadow.color.clone_from(color);
                }
                if let Some(blur) = patch.blur {
                    shadow.blur = non_negative(blur);
                }
                if let Some(offset_x) = patch.offset_x {
                    shadow.offset_x = finite_or_zero(offset_x);
                }
                if let Some(offset_y) = patch.offset_y {
                    shadow.offset_y = finite_or_zero(offset_y);
                }
                style.shadow = Some(shadow);
            },
            StyleUpdate::ClearShadow => style.shadow = None,
            StyleUpdate::Stroke(patch) => {
                let mut stroke = style.stroke.take().unwrap_or_default();
                if let Some(color) = &patch.color {
                    stroke.color.clone_from(color);
                }
                if let Some(width) = patch.width {
                    stroke.width = non_negative(width);
                }
                style.stroke = Some(stroke);
            },
            StyleUpdate::ClearStroke => style.stroke = None,
            StyleUpdate::Transform(transform) => {
                if let Some(rotation) = transform.rotation {
                    style.rotation = finite_or_zero(rotation);
                }
                if let Some(align) = transform.text_align {
                    style.text_align = align;
                }
                if let Some(spacing) = transform.letter_spacing {
                    style.letter_spacing = spacing.filter(|s| s.is_finite());
                }
            },
            StyleUpdate::Reset => style = TextStyle::default(),
        }
        style
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Font group update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontUpdate {
    pub family: Option<String>,
    pub size: Option<f32>,
    pub weight: Option<FontWeight>,
}

/// Fill group update: color, background and opacity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillUpdate {
    pub color: Option<String>,
    /// `Some(None)` removes the background
    pub background_color: Option<Option<String>>,
    pub opacity: Option<f32>,
}

/// Shadow group update, merged into the existing shadow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowUpdate {
    pub color: Option<String>,
    pub blur: Option<f32>,
    pub offset_x: Option<f32>,
    pub offset_y: Option<f32>,
}

/// Stroke group update, merged into the existing stroke
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokeUpdate {
    pub color: Option<String>,
    pub width: Option<f32>,
}

/// Transform group update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformUpdate {
    pub rotation: Option<f32>,
    pub text_align: Option<TextAlign>,
    /// `Some(None)` removes custom spacing
    pub letter_spacing: Option<Option<f32>>,
}

/// A style change scoped to one field group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "group", rename_all = "snake_case")]
pub enum StyleUpdate {
    Font(FontUpdate),
    Fill(FillUpdate),
    Shadow(ShadowUpdate),
    ClearShadow,
    Stroke(StrokeUpdate),
    ClearStroke,
    Transform(TransformUpdate),
    /// Restore every field to the default style
    Reset,
}

impl StyleUpdate {
    #[must_use]
    pub fn color(color: impl Into<String>) -> Self {
        Self::Fill(FillUpdate {
            color: Some(color.into()),
            ..FillUpdate::default()
        })
    }

    #[must_use]
    pub fn opacity(opacity: f32) -> Self {
        Self::Fill(FillUpdate {
            opacity: Some(opacity),
            ..FillUpdate::default()
        })
    }

    #[must_use]
    pub fn font_size(size: f32) -> Self {
        Self::Font(FontUpdate {
            size: Some(size),
            ..FontUpdate::default()
        })
    }

    #[must_use]
    pub fn rotation(degrees: f32) -> Self {
        Self::Transform(TransformUpdate {
            rotation: Some(degrees),
            ..TransformUpdate::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style() {
        let style = TextStyle::default();
        assert!((style.font_size - 48.0).abs() < f32::EPSILON);
        assert_eq!(style.font_family, "Arial");
        assert_eq!(style.font_weight, FontWeight::W700);
        assert_eq!(style.text_align, TextAlign::Center);
        assert_eq!(style.font_shorthand(), "700 48px Arial");
    }

    #[test]
    fn test_color_change_keeps_shadow() {
        let shadowed = TextStyle::default().apply(&StyleUpdate::Shadow(ShadowUpdate {
            blur: Some(4.0),
            ..ShadowUpdate::default()
        }));
        let recolored = shadowed.apply(&StyleUpdate::color("#ffffff"));
        assert_eq!(recolored.color, "#ffffff");
        assert_eq!(recolored.shadow, shadowed.shadow);
        assert_eq!(recolored.font_size, shadowed.font_size);
    }

    #[test]
    fn test_shadow_patch_merges() {
        let style = TextStyle::default()
            .apply(&StyleUpdate::Shadow(ShadowUpdate {
                color: Some("#ff0000".into()),
                blur: Some(3.0),
                ..ShadowUpdate::default()
            }))
            .apply(&StyleUpdate::Shadow(ShadowUpdate {
                offset_x: Some(5.0),
                ..ShadowUpdate::default()
            }));
        let shadow = style.shadow.unwrap();
        assert_eq!(shadow.color, "#ff0000");
        assert!((shadow.blur - 3.0).abs() < f32::EPSILON);
        assert!((shadow.offset_x - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_values_are_normalized() {
        let style = TextStyle::default()
            .apply(&StyleUpdate::font_size(-3.0))
            .apply(&StyleUpdate::opacity(7.0))
            .apply(&StyleUpdate::Stroke(StrokeUpdate {
                width: Some(-2.0),
                ..StrokeUpdate::default()
            }))
            .apply(&StyleUpdate::rotation(f32::NAN));
        assert!((style.font_size - 48.0).abs() < f32::EPSILON);
        assert!((style.opacity - 1.0).abs() < f32::EPSILON);
        assert!(style.stroke.unwrap().width.abs() < f32::EPSILON);
        assert!(style.rotation.abs() < f32::EPSILON);
    }

    #[test]
    fn test_rotation_normalization() {
        let mut style = TextStyle::default();
        style.rotation = -30.0;
        assert!((style.normalized_rotation() - 330.0).abs() < 1e-4);
        style.rotation = 750.0;
        assert!((style.normalized_rotation() - 30.0).abs() < 1e-4);
    }

    #[test]
    fn test_alignment_resolution() {
        assert_eq!(TextAlign::Justify.canvas_align(), CanvasAlign::Center);
        assert_eq!(TextAlign::Start.canvas_align(), CanvasAlign::Left);
        assert_eq!(TextAlign::from("diagonal".to_string()), TextAlign::Center);
    }

    #[test]
    fn test_style_json_shape() {
        let json = r##"{
            "fontSize": 32,
            "fontFamily": "Georgia",
            "fontWeight": "bold",
            "color": "#fff",
            "textAlign": "sideways",
            "shadow": {"color": "#000", "blur": 2, "offsetX": 1, "offsetY": 1}
        }"##;
        let style: TextStyle = serde_json::from_str(json).unwrap();
        assert_eq!(style.font_weight, FontWeight::Bold);
        assert_eq!(style.text_align, TextAlign::Center);
        assert!((style.opacity - 1.0).abs() < f32::EPSILON);
        assert!(style.shadow.is_some());

        let back = serde_json::to_value(&style).unwrap();
        assert_eq!(back["fontWeight"], "bold");
        assert!(back.get("stroke").is_none());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let style = TextStyle::default()
            .apply(&StyleUpdate::color("#000"))
            .apply(&StyleUpdate::Reset);
        assert_eq!(style, TextStyle::default());
    }
}
