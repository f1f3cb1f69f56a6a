use crate::config::DecodeOptions;
use crate::error::{Result, SpmError};
use crate::parser::parse_header;
use crate::processing::decode_images;
use crate::types::header::{Header, HeaderEntry, HeaderSection};
use crate::types::image::CiaoImage;
use crate::types::parameter::CiaoParameter;
use crate::types::quantity::UnitRegistry;
use crate::utils::file_utils::RawBuffer;
use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// A parsed CIAO file: raw buffer, header and calibrated images
#[derive(Debug)]
pub struct SpmFile {
    path: Option<PathBuf>,
    buffer: RawBuffer,
    header: Header,
    images: Vec<CiaoImage>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    path: Option<&'a Path>,
    header: &'a Header,
    images: &'a [CiaoImage],
}

impl SpmFile {
    /// Open a file with the default unit registry and decode options
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &UnitRegistry::default(), &DecodeOptions::default())
    }

    /// Memory-map a file, parse its header and decode every image
    pub fn open_with(
        path: impl AsRef<Path>,
        units: &UnitRegistry,
        options: &DecodeOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let buffer = RawBuffer::open(path)?;
        let mut file = Self::decode(buffer, units, options)?;
        file.path = Some(path.to_path_buf());

        info!(
            path = %path.display(),
            images = file.images.len(),
            "Opened SPM file"
        );
        Ok(file)
    }

    /// Decode a file already held in memory
    pub fn from_bytes(bytes: Vec<u8>, units: &UnitRegistry, options: &DecodeOptions) -> Result<Self> {
        Self::decode(RawBuffer::from(bytes), units, options)
    }

    fn decode(buffer: RawBuffer, units: &UnitRegistry, options: &DecodeOptions) -> Result<Self> {
        let header = parse_header(&buffer, units)?;
        let images = decode_images(&header, &buffer, options)?;
        Ok(Self {
            path: None,
            buffer,
            header,
            images,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The whole file content
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// File-level metadata from the non-image sections (later sections win)
    pub fn get(&self, key: &str) -> Option<&HeaderEntry> {
        self.header.get(key)
    }

    pub fn section(&self, name: &str) -> Option<&HeaderSection> {
        self.header.section(name)
    }

    /// Acquisition date from the `Date` field
    pub fn date(&self) -> Option<&NaiveDateTime> {
        self.get("Date")?.value()?.as_timestamp()
    }

    /// Decoded images in file order
    pub fn images(&self) -> &[CiaoImage] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Result<&CiaoImage> {
        self.images.get(index).ok_or(SpmError::ImageIndex {
            index,
            count: self.images.len(),
        })
    }

    pub fn image_by_title(&self, title: &str) -> Option<&CiaoImage> {
        self.images.iter().find(|image| image.title() == title)
    }

    pub fn titles(&self) -> Vec<&str> {
        self.images.iter().map(CiaoImage::title).collect()
    }

    /// CIAO parameters of the non-image sections keyed by group number, each
    /// group sorted by key. A key defined in several sections counts once.
    pub fn parameter_groups(&self) -> BTreeMap<Option<u32>, Vec<&CiaoParameter>> {
        let by_key: BTreeMap<&str, &CiaoParameter> = self
            .header
            .sections()
            .iter()
            .flat_map(|section| section.iter())
            .filter_map(|(key, entry)| entry.as_parameter().map(|p| (key, p)))
            .collect();

        by_key
            .into_values()
            .into_group_map_by(|param| param.group())
            .into_iter()
            .collect()
    }

    /// Header and image metadata as pretty-printed JSON
    pub fn metadata_json(&self) -> Result<String> {
        let metadata = Metadata {
            path: self.path(),
            header: &self.header,
            images: &self.images,
        };
        Ok(serde_json::to_string_pretty(&metadata)?)
    }

    /// Get a summary of the file contents
    pub fn summary(&self) -> String {
        let mut result = String::new();

        result.push_str("SPM File Information:\n");
        if let Some(path) = self.path() {
            result.push_str(&format!("  Path: {}\n", path.display()));
        }
        if let Some(date) = self.date() {
            result.push_str(&format!("  Date: {}\n", date));
        }
        if let Some(mode) = self.get("Operating mode").and_then(HeaderEntry::text) {
            result.push_str(&format!("  Operating mode: {}\n", mode));
        }
        result.push_str(&format!(
            "  Sections: {}\n",
            self.header.sections().iter().map(HeaderSection::name).join(", ")
        ));

        result.push_str(&format!("\nImages ({}):\n", self.images.len()));
        for (index, image) in self.images.iter().enumerate() {
            result.push_str(&format!("  {index}: {image}\n"));
            result.push_str(&format!(
                "     {} per pixel, Z factor {}\n",
                image.pixel_width(),
                image.z_factor()
            ));
        }

        result
    }
}

impl fmt::Display for SpmFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .path()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string());
        let date = self
            .get("Date")
            .and_then(HeaderEntry::value)
            .map(ToString::to_string)
            .unwrap_or_default();
        write!(
            f,
            "SPM file: \"{name}\", {date}. Images: [{}]",
            self.titles().iter().map(|t| format!("\"{t}\"")).join(", ")
        )
    }
}
