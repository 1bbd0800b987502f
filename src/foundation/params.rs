use serde::{Deserialize, Serialize};

use crate::foundation::error::{StripesError, StripesResult};

/// Everything the engine needs to draw one composited image.
///
/// Parameters are captured fresh from the live editor state at the start of every render attempt
/// and compared field-by-field for de-duplication.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParameters {
    /// Text drawn above the stripes.
    pub text_top: String,
    /// Text drawn below the stripes.
    pub text_bottom: String,
    /// Font size in pixels, at least 1.
    pub font_size: u32,
    /// Number of stripes, at least 1.
    pub stripe_count: u32,
    /// Height of the stripe band as a percentage of the image height, at least 1.
    pub stripe_height_percent: u32,
}

impl RenderParameters {
    /// Build parameters from raw editor input strings.
    ///
    /// Numeric fields that do not parse count as 0 and every numeric field is clamped to at
    /// least 1, so the result always passes [`RenderParameters::validate`].
    pub fn from_inputs(
        text_top: &str,
        text_bottom: &str,
        font_size: &str,
        stripe_count: &str,
        stripe_height_percent: &str,
    ) -> Self {
        Self {
            text_top: text_top.to_owned(),
            text_bottom: text_bottom.to_owned(),
            font_size: parse_at_least_one(font_size),
            stripe_count: parse_at_least_one(stripe_count),
            stripe_height_percent: parse_at_least_one(stripe_height_percent),
        }
    }

    /// Reject numeric fields below 1.
    pub fn validate(&self) -> StripesResult<()> {
        for (name, value) in [
            ("fontSize", self.font_size),
            ("stripeCount", self.stripe_count),
            ("stripeHeightPercent", self.stripe_height_percent),
        ] {
            if value < 1 {
                return Err(StripesError::validation(format!(
                    "{name} must be at least 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self {
            text_top: String::new(),
            text_bottom: String::new(),
            font_size: 48,
            stripe_count: 5,
            stripe_height_percent: 20,
        }
    }
}

// Leading integer prefix, like a lenient form reader: "12px" -> 12, "abc" -> 0.
fn parse_at_least_one(raw: &str) -> u32 {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if negative || end == 0 {
        return 1;
    }
    digits[..end].parse::<u32>().unwrap_or(u32::MAX).max(1)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/params.rs"]
mod tests;
