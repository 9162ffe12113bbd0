//! Video filter stages and the generic filter node they lower into.

use std::fmt;

/// One named effect in the video chain. Stages apply left to right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStage {
    /// Engine no-op (`null`). Anchors a chain that carries no effect.
    Passthrough,
    /// Mirror horizontally (`hflip`).
    HorizontalFlip,
    /// Brightness offset in the engine's -1.0..=1.0 range (`eq=brightness=`).
    Brightness { level: f64 },
    /// Force saturation to zero (`hue=s=0`).
    Desaturate,
}

impl FilterStage {
    /// Whether this stage changes the picture beyond the always-present brightness.
    pub fn is_effect(&self) -> bool {
        matches!(self, Self::HorizontalFlip | Self::Desaturate)
    }

    /// Lower into a generic engine filter.
    pub fn to_filter(&self) -> Filter {
        match *self {
            Self::Passthrough => Filter::new("null"),
            Self::HorizontalFlip => Filter::new("hflip"),
            Self::Brightness { level } => {
                Filter::new("eq").with_named("brightness", format_decimal(level))
            }
            Self::Desaturate => Filter::new("hue").with_named("s", "0"),
        }
    }
}

/// An engine filter invocation: a name plus `:`-separated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    name: String,
    args: Vec<FilterArg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FilterArg {
    Positional(String),
    Named(String, String),
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(FilterArg::Positional(value.into()));
        self
    }

    pub fn with_named(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push(FilterArg::Named(key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            f.write_str(if i == 0 { "=" } else { ":" })?;
            match arg {
                FilterArg::Positional(value) => f.write_str(value)?,
                FilterArg::Named(key, value) => write!(f, "{key}={value}")?,
            }
        }
        Ok(())
    }
}

/// Render a float the way the engine logs expect it: always with a decimal point.
fn format_decimal(value: f64) -> String {
    let mut rendered = value.to_string();
    if value.is_finite() && !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}
