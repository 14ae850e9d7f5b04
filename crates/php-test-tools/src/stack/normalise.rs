// Stack normaliser - turns a raw host stack into stable, comparable text
//
// Pipeline, in order:
// 1. Frames of evaluated (transpiled) code are mapped back to PHP positions
// 2. Test-runner frames are rewritten to a placeholder, then runs collapsed
// 3. Platform-internal frames likewise
// 4. The runtime library's install path is replaced with a placeholder
//
// Normalisation is all-or-nothing: any frame that cannot be mapped fails
// the whole call.

use php_runtime_host::{SourceMapConsumer, SourceMapDecoder};

use super::frame::{parse_stack, render_stack, Coordinate, Frame, Location, StackLine};
use crate::config::NormaliseConfig;
use crate::error::NormaliseError;
use crate::registry::SourceMapEntry;

/// Number of header lines the evaluator adds in front of evaluated code.
///
/// `probe` is the stack of a snippet that raised on its first line.
pub fn header_lines_from_probe(probe: &str) -> Result<u32, NormaliseError> {
    let line = parse_stack(probe).into_iter().find_map(|line| match line {
        StackLine::Frame(Frame {
            location: Location::Evaluated { line, .. },
            ..
        }) => Some(line),
        _ => None,
    });

    match line {
        Some(line) if line > 0 => Ok(line - 1),
        _ => {
            tracing::warn!(probe, "Header probe stack has no usable evaluated frame");
            Err(NormaliseError::HeaderProbeFailed {
                probe: probe.to_string(),
            })
        }
    }
}

/// Normalises stacks raised by transpiled modules.
#[derive(Debug, Clone)]
pub struct StackNormaliser {
    config: NormaliseConfig,
    runtime_library_path: Option<String>,
}

impl StackNormaliser {
    pub fn new(config: NormaliseConfig, runtime_library_path: Option<String>) -> Self {
        Self {
            config,
            runtime_library_path: runtime_library_path.filter(|path| !path.is_empty()),
        }
    }

    /// Normalise `stack`, using `entry` to map evaluated frames.
    pub async fn normalise(
        &self,
        stack: &str,
        entry: &SourceMapEntry,
        decoder: &dyn SourceMapDecoder,
        header_lines: u32,
    ) -> Result<String, NormaliseError> {
        let consumer = decoder
            .consume(&entry.map)
            .await
            .map_err(NormaliseError::Decode)?;

        let mut lines = parse_stack(stack);
        map_evaluated_frames(&mut lines, consumer.as_ref(), entry, header_lines)?;

        let runner_path = self.config.test_runner_path.as_str();
        let lines = fold_frames(
            lines,
            |frame| frame.path().is_some_and(|path| path.contains(runner_path)),
            &self.config.test_runner_placeholder,
            &self.config.test_runner_marker,
        );

        let prefixes = &self.config.platform_prefixes;
        let lines = fold_frames(
            lines,
            |frame| {
                frame
                    .path()
                    .is_some_and(|path| prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())))
            },
            &self.config.platform_placeholder,
            &self.config.platform_marker,
        );

        let output = render_stack(&lines);
        Ok(match &self.runtime_library_path {
            Some(path) => output.replace(path.as_str(), &self.config.runtime_placeholder),
            None => output,
        })
    }
}

/// Replace every evaluated frame's location with its original PHP position.
fn map_evaluated_frames(
    lines: &mut [StackLine],
    consumer: &dyn SourceMapConsumer,
    entry: &SourceMapEntry,
    header_lines: u32,
) -> Result<(), NormaliseError> {
    for line in lines.iter_mut() {
        let StackLine::Frame(frame) = line else {
            continue;
        };
        let Location::Evaluated {
            line: generated_line,
            column: generated_column,
            ..
        } = frame.location
        else {
            continue;
        };

        let unmappable = || NormaliseError::UnmappableFrame {
            frame: frame.to_string().trim().to_string(),
            line: generated_line,
            column: generated_column,
        };

        let line = generated_line
            .checked_sub(header_lines)
            .filter(|line| *line > 0)
            .ok_or_else(unmappable)?;

        // Stack columns are 1-based, source-map columns 0-based
        let position = consumer.original_position_for(line, generated_column.saturating_sub(1));
        let (Some(original_line), Some(original_column)) = (position.line, position.column) else {
            return Err(unmappable());
        };
        let path = entry
            .path
            .clone()
            .or(position.source)
            .ok_or_else(unmappable)?;

        tracing::trace!(generated_line, generated_column, original_line, %path, "Mapped evaluated frame");
        frame.location = Location::File {
            path,
            line: Coordinate::At(original_line),
            column: Coordinate::At(original_column + 1),
        };
    }

    Ok(())
}

/// Rewrite frames matching `is_noise` to `placeholder:*:*`, then collapse
/// each consecutive run of them into a single `marker` line.
///
/// Frames are tagged as noise when classified, so a frame that merely has
/// the placeholder as its path is left alone.
fn fold_frames(
    lines: Vec<StackLine>,
    is_noise: impl Fn(&Frame) -> bool,
    placeholder: &str,
    marker: &str,
) -> Vec<StackLine> {
    let rewritten = lines.into_iter().map(|line| match line {
        StackLine::Frame(mut frame) if is_noise(&frame) => {
            frame.location = Location::File {
                path: placeholder.to_string(),
                line: Coordinate::Any,
                column: Coordinate::Any,
            };
            (true, StackLine::Frame(frame))
        }
        line => (false, line),
    });

    let mut folded: Vec<StackLine> = Vec::new();
    let mut in_run = false;
    for (noise, line) in rewritten {
        match (noise, line) {
            (true, StackLine::Frame(frame)) => {
                match folded.last_mut() {
                    // Extend the current run, taking over its line ending
                    Some(StackLine::Marker { eol, .. }) if in_run => *eol = frame.eol,
                    _ => folded.push(StackLine::Marker {
                        indent: frame.indent,
                        label: marker.to_string(),
                        eol: frame.eol,
                    }),
                }
                in_run = true;
            }
            (_, line) => {
                in_run = false;
                folded.push(line);
            }
        }
    }

    tracing::trace!(marker, lines = folded.len(), "Folded frames");
    folded
}
