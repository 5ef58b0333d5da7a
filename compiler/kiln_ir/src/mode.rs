//! Output serialization mode.

use std::fmt;

/// How markup is serialized.
///
/// HTML-family modes render boolean attributes bare and void elements
/// without end tags; XML mode keeps everything well-formed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Mode {
    #[default]
    Xml,
    Html,
    Html5,
}

impl Mode {
    /// Returns `true` for `Html` and `Html5`.
    #[inline]
    pub fn is_html(self) -> bool {
        matches!(self, Mode::Html | Mode::Html5)
    }

    /// Parse a mode name as used in configuration (`"xml"`, `"html"`, `"html5"`).
    pub fn from_name(name: &str) -> Option<Mode> {
        match name.to_ascii_lowercase().as_str() {
            "xml" => Some(Mode::Xml),
            "html" => Some(Mode::Html),
            "html5" => Some(Mode::Html5),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Xml => "xml",
            Mode::Html => "html",
            Mode::Html5 => "html5",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
