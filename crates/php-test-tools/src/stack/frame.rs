//! Structured stack lines.
//!
//! Host stacks are text in the V8 style:
//!
//! ```text
//! Error: Bang
//!     at Closure (eval at evaluate (/src/eval.rs:10:5), <anonymous>:3:15)
//!     at Runnable.run (/project/node_modules/mocha/lib/runnable.js:354:21)
//!     at node:internal/main/run_main_module:28:49
//! ```
//!
//! Each line becomes a [`StackLine`]; frames are rendered back to text in the
//! same shape they were parsed from.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// A line or column number, or the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordinate {
    At(u32),
    Any,
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::At(n) => write!(f, "{}", n),
            Coordinate::Any => f.write_str("*"),
        }
    }
}

/// Where a frame points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// `<path>:<line>:<column>`
    File {
        path: String,
        line: Coordinate,
        column: Coordinate,
    },
    /// `eval at <origin>, <anonymous>:<line>:<column>`: code produced by the evaluator.
    Evaluated { origin: String, line: u32, column: u32 },
    /// Anything else, e.g. `native` or `<anonymous>`.
    Opaque(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File { path, line, column } => write!(f, "{}:{}:{}", path, line, column),
            Location::Evaluated { origin, line, column } => {
                write!(f, "eval at {}, <anonymous>:{}:{}", origin, line, column)
            }
            Location::Opaque(text) => f.write_str(text),
        }
    }
}

/// A single `at ...` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub indent: String,
    pub function: Option<String>,
    pub location: Location,
    /// Line ending the frame was read with (possibly empty).
    pub eol: String,
}

impl Frame {
    /// Path of a file location.
    pub fn path(&self) -> Option<&str> {
        match &self.location {
            Location::File { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) => write!(f, "{}at {} ({}){}", self.indent, function, self.location, self.eol),
            None => write!(f, "{}at {}{}", self.indent, self.location, self.eol),
        }
    }
}

/// One line of a stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackLine {
    Frame(Frame),
    /// A collapsed run of frames.
    Marker {
        indent: String,
        label: String,
        eol: String,
    },
    /// Message lines and anything else that is not a frame.
    Text(String),
}

impl fmt::Display for StackLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackLine::Frame(frame) => fmt::Display::fmt(frame, f),
            StackLine::Marker { indent, label, eol } => write!(f, "{}at {}{}", indent, label, eol),
            StackLine::Text(text) => f.write_str(text),
        }
    }
}

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\s*)at (?:(.+?) \((.+)\)|(.+))$").expect("frame pattern is valid")
    })
}

fn evaluated_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^eval at (.+), <anonymous>:(\d+):(\d+)$").expect("eval pattern is valid")
    })
}

fn file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.+):(\d+|\*):(\d+|\*)$").expect("file pattern is valid")
    })
}

/// `None` for numbers that do not fit a coordinate.
fn parse_coordinate(text: &str) -> Option<Coordinate> {
    match text {
        "*" => Some(Coordinate::Any),
        _ => text.parse().ok().map(Coordinate::At),
    }
}

/// Parse the text between the parentheses of a frame (or after `at `).
pub fn parse_location(text: &str) -> Location {
    if let Some(caps) = evaluated_pattern().captures(text) {
        if let (Ok(line), Ok(column)) = (caps[2].parse(), caps[3].parse()) {
            return Location::Evaluated {
                origin: caps[1].to_string(),
                line,
                column,
            };
        }
    }

    if let Some(caps) = file_pattern().captures(text) {
        if let (Some(line), Some(column)) = (parse_coordinate(&caps[2]), parse_coordinate(&caps[3])) {
            return Location::File {
                path: caps[1].to_string(),
                line,
                column,
            };
        }
    }

    Location::Opaque(text.to_string())
}

fn split_eol(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\r', '\n']);
    (body, &line[body.len()..])
}

/// Parse a single line (including its line ending).
pub fn parse_line(line: &str) -> StackLine {
    let (body, eol) = split_eol(line);

    let Some(caps) = frame_pattern().captures(body) else {
        return StackLine::Text(line.to_string());
    };

    let (function, location) = match (caps.get(2), caps.get(3), caps.get(4)) {
        (Some(function), Some(location), _) => (Some(function.as_str().to_string()), location.as_str()),
        (_, _, Some(location)) => (None, location.as_str()),
        _ => return StackLine::Text(line.to_string()),
    };

    StackLine::Frame(Frame {
        indent: caps[1].to_string(),
        function,
        location: parse_location(location),
        eol: eol.to_string(),
    })
}

/// Split a stack into lines, keeping line endings.
pub fn parse_stack(stack: &str) -> Vec<StackLine> {
    stack.split_inclusive('\n').map(parse_line).collect()
}

/// Render parsed lines back to text.
pub fn render_stack(lines: &[StackLine]) -> String {
    lines.iter().map(|line| line.to_string()).collect()
}
