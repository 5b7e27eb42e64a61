use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Rendering options for the text dialects. Decoding accepts either case and
/// either line ending regardless of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    pub uppercase: bool,
    pub line_ending: LineEnding,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            uppercase: true,
            line_ending: LineEnding::Lf,
        }
    }
}

/// Convenience builder for [`TextOptions`].
#[derive(Debug, Default)]
pub struct TextOptionsBuilder {
    options: TextOptions,
}

impl TextOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hex digits in upper case (the default) or lower case.
    pub fn with_uppercase(mut self, uppercase: bool) -> Self {
        self.options.uppercase = uppercase;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.options.line_ending = line_ending;
        self
    }

    /// Retrieves the options built
    pub fn get(self) -> TextOptions {
        self.options
    }
}
