use crate::types::parameter::CiaoParameter;
use crate::types::quantity::Quantity;
use crate::types::value::Value;
use crate::utils::strip_group;
use serde::{Serialize, Serializer};

/// Name of the repeating per-image section
pub const IMAGE_SECTION: &str = "Ciao image list";

/// One `key: value` entry of a header section
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderEntry {
    Value(Value),
    Parameter(CiaoParameter),
    /// The line had a key but nothing after the colon
    Empty,
}

impl HeaderEntry {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            HeaderEntry::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&CiaoParameter> {
        match self {
            HeaderEntry::Parameter(p) => Some(p),
            _ => None,
        }
    }

    /// The value a consumer would read: the plain value, or a parameter's hard value
    pub fn value(&self) -> Option<&Value> {
        match self {
            HeaderEntry::Value(v) => Some(v),
            HeaderEntry::Parameter(p) => p.hard_value(),
            HeaderEntry::Empty => None,
        }
    }

    /// Scalar numeric content as a quantity (bare numbers are dimensionless)
    pub fn quantity(&self) -> Option<Quantity<f64>> {
        self.value()?.as_quantity()
    }

    /// Text content; for select parameters the external designation
    pub fn text(&self) -> Option<&str> {
        match self {
            HeaderEntry::Parameter(CiaoParameter::Select(p)) => Some(&p.external_designation),
            other => other.value()?.as_str(),
        }
    }
}

/// An ordered mapping from key to entry for one `*` section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderSection {
    name: String,
    entries: Vec<(String, HeaderEntry)>,
}

impl HeaderSection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert an entry; an existing key keeps its position and gets the new entry
    pub fn insert(&mut self, key: impl Into<String>, entry: HeaderEntry) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((key, entry)),
        }
    }

    /// Exact key lookup
    pub fn get(&self, key: &str) -> Option<&HeaderEntry> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, entry)| entry)
    }

    /// Exact key lookup, falling back to matching without group numbers
    /// (`Z scale` finds `2:Z scale` and vice versa)
    pub fn lookup(&self, key: &str) -> Option<&HeaderEntry> {
        self.get(key).or_else(|| {
            let name = strip_group(key);
            self.entries
                .iter()
                .find(|(k, _)| strip_group(k) == name)
                .map(|(_, entry)| entry)
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn parameters(&self) -> impl Iterator<Item = &CiaoParameter> {
        self.entries.iter().filter_map(|(_, e)| e.as_parameter())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for HeaderSection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

/// The assembled header: named sections plus the ordered per-image sections
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Header {
    #[serde(serialize_with = "serialize_sections")]
    sections: Vec<HeaderSection>,
    images: Vec<HeaderSection>,
}

fn serialize_sections<S: Serializer>(
    sections: &[HeaderSection],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(sections.iter().map(|s| (s.name(), s)))
}

impl Header {
    pub fn new(sections: Vec<HeaderSection>, images: Vec<HeaderSection>) -> Self {
        Self { sections, images }
    }

    /// Non-image sections in file order
    pub fn sections(&self) -> &[HeaderSection] {
        &self.sections
    }

    pub fn section(&self, name: &str) -> Option<&HeaderSection> {
        self.sections.iter().find(|s| s.name() == name)
    }

    /// Per-image sections in file order
    pub fn images(&self) -> &[HeaderSection] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&HeaderSection> {
        self.images.get(index)
    }

    /// File-level lookup across the non-image sections. Later sections win, and
    /// an exact key match anywhere beats a match without group numbers.
    pub fn get(&self, key: &str) -> Option<&HeaderEntry> {
        self.sections
            .iter()
            .rev()
            .find_map(|s| s.get(key))
            .or_else(|| self.sections.iter().rev().find_map(|s| s.lookup(key)))
    }
}
