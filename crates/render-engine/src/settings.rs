//! User-facing render settings and their translation into filter stages.
//!
//! The frontend sends a JSON document shaped like
//! `{"video": {"flip": true, "brightness": 150, "grayscale": 0}}`.
//! Anything outside the `video` section is ignored.

use serde::{Deserialize, Deserializer, Serialize};

use nevis_common::error::{NevisError, NevisResult};

use crate::stage::FilterStage;

/// Neutral brightness on the user's 0-200 scale.
pub const DEFAULT_BRIGHTNESS: i64 = 100;

/// Accepted brightness range on the user's scale.
pub const BRIGHTNESS_RANGE: std::ops::RangeInclusive<i64> = 0..=200;

/// The grayscale value that turns desaturation on. Every other value is "off".
pub const GRAYSCALE_FULL: i64 = 100;

/// Top-level settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Video effect section. `null` or missing means all defaults.
    #[serde(default, deserialize_with = "null_as_default")]
    pub video: VideoSettings,
}

/// Video effect parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Mirror horizontally.
    #[serde(default, deserialize_with = "truthy")]
    pub flip: bool,

    /// Brightness on a 0-200 scale, 100 is unchanged.
    #[serde(default = "default_brightness", deserialize_with = "brightness_or_default")]
    pub brightness: i64,

    /// Full desaturation. Set only when the document's `grayscale` equals 100.
    #[serde(default, deserialize_with = "full_grayscale")]
    pub grayscale: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            flip: false,
            brightness: DEFAULT_BRIGHTNESS,
            grayscale: false,
        }
    }
}

fn default_brightness() -> i64 {
    DEFAULT_BRIGHTNESS
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn brightness_or_default<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(DEFAULT_BRIGHTNESS))
}

/// Accept the loose truthiness the frontend produces for toggles.
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde_json::Value;

    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

/// `grayscale` is a percentage, but only a numeric 100 has an effect.
/// Strings, booleans and every other number leave the video in colour.
fn full_grayscale<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64() == Some(GRAYSCALE_FULL as f64))
}

/// Parse the raw `settings` form field.
///
/// Absent or blank input means "use all defaults".
pub fn parse_settings(raw: Option<&str>) -> NevisResult<RenderSettings> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(RenderSettings::default()),
        Some(raw) => raw,
    };

    serde_json::from_str(raw)
        .map_err(|e| NevisError::bad_request(format!("Malformed settings document: {e}")))
}

impl RenderSettings {
    /// Reject values the engine would only fail on later.
    pub fn validate(&self) -> NevisResult<()> {
        let brightness = self.video.brightness;
        if !BRIGHTNESS_RANGE.contains(&brightness) {
            return Err(NevisError::bad_request(format!(
                "Brightness {brightness} outside {}..={}",
                BRIGHTNESS_RANGE.start(),
                BRIGHTNESS_RANGE.end()
            )));
        }
        Ok(())
    }
}

/// Map the 0-200 user scale onto the engine's -1.0..=1.0 brightness range.
pub fn normalize_brightness(brightness: i64) -> f64 {
    (brightness - DEFAULT_BRIGHTNESS) as f64 / 100.0
}

/// Translate video settings into an ordered list of filter stages.
///
/// Brightness is always present. When neither flip nor desaturation applies,
/// the chain is anchored with a passthrough stage.
pub fn translate(video: &VideoSettings) -> Vec<FilterStage> {
    let mut stages = Vec::with_capacity(3);

    if video.flip {
        stages.push(FilterStage::HorizontalFlip);
    }

    stages.push(FilterStage::Brightness {
        level: normalize_brightness(video.brightness),
    });

    if video.grayscale {
        stages.push(FilterStage::Desaturate);
    }

    if !stages.iter().any(FilterStage::is_effect) {
        stages.insert(0, FilterStage::Passthrough);
    }

    stages
}
