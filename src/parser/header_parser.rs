use crate::error::{Result, SpmError};
use crate::parser::parameter_parser::parse_parameter;
use crate::parser::value_parser::parse_value;
use crate::types::header::{Header, HeaderEntry, HeaderSection, IMAGE_SECTION};
use crate::types::quantity::UnitRegistry;
use crate::utils::latin1_to_string;
use tracing::{debug, warn};
use winnow::{
    Parser,
    combinator::{alt, opt, preceded, separated_pair},
    token::{rest, take_till},
};

/// Section name of the first header line
pub const FILE_LIST: &str = "File list";
/// Section name whose marker terminates the header
pub const FILE_LIST_END: &str = "File list end";

const START_SENTINEL: &[u8] = b"\\*File list";
const END_SENTINEL: &[u8] = b"\\*File list end";

/// A classified header line
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderLine<'s> {
    /// `\*Name`
    Section(&'s str),
    /// `\@...`, kept whole for the parameter grammar
    Parameter(&'s str),
    /// `\Key: value`
    Entry { key: &'s str, value: &'s str },
}

fn header_line<'s>(input: &mut &'s str) -> winnow::Result<HeaderLine<'s>> {
    opt('\\').parse_next(input)?;
    alt((
        preceded('*', rest).map(|name: &str| HeaderLine::Section(name.trim())),
        ('@', rest).take().map(HeaderLine::Parameter),
        separated_pair(take_till(0.., ':'), ':', rest).map(|(key, value): (&str, &str)| {
            HeaderLine::Entry {
                key: key.trim(),
                value,
            }
        }),
    ))
    .parse_next(input)
}

/// Classify a single (already decoded) header line. Blank lines yield `None`.
fn classify_line(line: &str) -> Option<std::result::Result<HeaderLine<'_>, ()>> {
    let line = line.trim_end();
    if line.trim_start_matches('\\').trim().is_empty() {
        return None;
    }
    Some(header_line.parse(line).map_err(|_| ()))
}

/// Split the buffer into lines and return those between the start sentinel and
/// the end sentinel, both included
pub fn header_lines(bytes: &[u8]) -> Result<Vec<&[u8]>> {
    let mut lines = bytes
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

    let start = lines
        .by_ref()
        .find(|line| line.trim_ascii() == START_SENTINEL)
        .ok_or(SpmError::FormatBoundary {
            missing: "\\*File list",
        })?;

    let mut header = vec![start];
    for line in lines {
        header.push(line);
        if line.trim_ascii() == END_SENTINEL {
            return Ok(header);
        }
    }
    Err(SpmError::FormatBoundary {
        missing: "\\*File list end",
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Section(usize),
    Image(usize),
}

/// Assembles a [`Header`] from lines fed one at a time.
///
/// Every `*` marker opens a section. `Ciao image list` may repeat and each
/// occurrence starts a new per-image record; re-opening any other name replaces
/// the earlier section. Lines after `*File list end` are ignored.
#[derive(Debug)]
pub struct HeaderBuilder<'u> {
    units: &'u UnitRegistry,
    sections: Vec<HeaderSection>,
    images: Vec<HeaderSection>,
    target: Option<Target>,
    finished: bool,
}

impl<'u> HeaderBuilder<'u> {
    pub fn new(units: &'u UnitRegistry) -> Self {
        Self {
            units,
            sections: Vec::new(),
            images: Vec::new(),
            target: None,
            finished: false,
        }
    }

    /// Whether the terminating `*File list end` marker has been seen
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn open_section(&mut self, name: &str) {
        if name == FILE_LIST_END {
            debug!(
                sections = self.sections.len(),
                images = self.images.len(),
                "Reached end of header"
            );
            self.finished = true;
            self.target = None;
            return;
        }

        if name == IMAGE_SECTION {
            self.images.push(HeaderSection::new(name));
            self.target = Some(Target::Image(self.images.len() - 1));
            debug!(index = self.images.len() - 1, "Opened image section");
            return;
        }

        match self.sections.iter().position(|s| s.name() == name) {
            Some(index) => {
                warn!(section = name, "Section opened twice, replacing earlier entries");
                self.sections[index] = HeaderSection::new(name);
                self.target = Some(Target::Section(index));
            }
            None => {
                self.sections.push(HeaderSection::new(name));
                self.target = Some(Target::Section(self.sections.len() - 1));
                debug!(section = name, "Opened header section");
            }
        }
    }

    fn current(&mut self) -> Option<&mut HeaderSection> {
        match self.target? {
            Target::Section(i) => self.sections.get_mut(i),
            Target::Image(i) => self.images.get_mut(i),
        }
    }

    fn current_name(&self) -> String {
        let section = match self.target {
            Some(Target::Section(i)) => self.sections.get(i),
            Some(Target::Image(i)) => self.images.get(i),
            None => None,
        };
        section.map_or_else(|| "<no section>".to_string(), |s| s.name().to_string())
    }

    fn malformed(&self, line: &str) -> SpmError {
        SpmError::MalformedLine {
            section: self.current_name(),
            line: line.to_string(),
        }
    }

    /// Feed one decoded line
    pub fn push_line(&mut self, line: &str) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        let Some(classified) = classify_line(line) else {
            return Ok(());
        };
        let classified = classified.map_err(|_| self.malformed(line))?;

        let (key, entry) = match classified {
            HeaderLine::Section(name) => {
                self.open_section(name);
                return Ok(());
            }
            HeaderLine::Parameter(text) => {
                let parameter = parse_parameter(text, self.units)?;
                (parameter.key(), HeaderEntry::Parameter(parameter))
            }
            HeaderLine::Entry { key, value } => {
                let entry = parse_value(value, self.units)
                    .map(HeaderEntry::Value)
                    .unwrap_or(HeaderEntry::Empty);
                (key.to_string(), entry)
            }
        };

        if self.target.is_none() {
            return Err(self.malformed(line));
        }
        if let Some(section) = self.current() {
            section.insert(key, entry);
        }
        Ok(())
    }

    pub fn finish(self) -> Header {
        Header::new(self.sections, self.images)
    }
}

/// Parses the text header of a CIAO file.
///
/// The header runs from the `\*File list` line to the `\*File list end` line;
/// lines are decoded as Latin-1. Binary data after the header is not touched.
pub fn parse_header(bytes: &[u8], units: &UnitRegistry) -> Result<Header> {
    let mut builder = HeaderBuilder::new(units);
    for line in header_lines(bytes)? {
        builder.push_line(&latin1_to_string(line))?;
    }
    Ok(builder.finish())
}
