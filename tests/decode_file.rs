use ciao_spm::{
    DecodeOptions, HeaderEntry, PixelWidth, SpmError, SpmFile, UnitRegistry, Value,
};
use ndarray::Array2;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Byte offset of the first pixel block in synthesized files
const HEADER_SIZE: usize = 8192;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Clone)]
struct TestImage {
    title: &'static str,
    rows: usize,
    cols: usize,
    width: usize,
    values: Vec<i64>,
    aspect: Option<&'static str>,
    soft_scale: &'static str,
}

impl TestImage {
    fn new(title: &'static str, rows: usize, cols: usize, width: usize) -> Self {
        Self {
            title,
            rows,
            cols,
            width,
            values: (0..rows * cols).map(|i| i as i64 * 100 - 250).collect(),
            aspect: Some("1:1"),
            soft_scale: "Sens. Zsens",
        }
    }

    fn aspect(mut self, aspect: Option<&'static str>) -> Self {
        self.aspect = aspect;
        self
    }

    fn soft_scale(mut self, soft_scale: &'static str) -> Self {
        self.soft_scale = soft_scale;
        self
    }

    fn encode(&self) -> Vec<u8> {
        self.values
            .iter()
            .flat_map(|&v| match self.width {
                2 => (v as i16).to_le_bytes().to_vec(),
                8 => v.to_le_bytes().to_vec(),
                // 4, and odd widths taken from the low bytes of an i32
                n => (v as i32).to_le_bytes()[..n.min(4)].to_vec(),
            })
            .collect()
    }

    /// Raw values as decoded: stored bottom row first
    fn expected_raw(&self) -> Array2<i64> {
        let stored = Array2::from_shape_vec((self.rows, self.cols), self.values.clone()).unwrap();
        stored.slice(ndarray::s![..;-1, ..]).to_owned()
    }
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u32 as u8).collect()
}

fn build_file_with(images: &[TestImage], scan_extra: &str, terminate: bool) -> Vec<u8> {
    let mut header = String::new();
    header.push_str("\\*File list\r\n");
    header.push_str("\\Version: 0x09200201\r\n");
    header.push_str("\\Date: 02:34:11 PM Wed May 24 2023\r\n");
    header.push_str("\\*Ciao scan list\r\n");
    header.push_str("\\Scan Size: 100 100 µm\r\n");
    header.push_str("\\Operating mode: Tapping\r\n");
    header.push_str("\\@Sens. Zsens: V 5.0 nm/V\r\n");
    header.push_str("\\@2:Sens. Deflection: V 40.0 nm/V\r\n");
    header.push_str(scan_extra);

    let mut offset = HEADER_SIZE;
    let mut blocks = Vec::new();
    for image in images {
        let block = image.encode();
        header.push_str("\\*Ciao image list\r\n");
        header.push_str(&format!("\\Data offset: {offset}\r\n"));
        header.push_str(&format!("\\Data length: {}\r\n", block.len()));
        header.push_str("\\Data type: AFM\r\n");
        header.push_str("\\Bytes/pixel: 2\r\n");
        header.push_str(&format!("\\Samps/line: {}\r\n", image.cols));
        header.push_str(&format!("\\Number of lines: {}\r\n", image.rows));
        if let Some(aspect) = image.aspect {
            header.push_str(&format!("\\Aspect Ratio: {aspect}\r\n"));
        }
        header.push_str(&format!(
            "\\@2:Z scale: V [{}] (0.5 V/LSB) 1.2 V\r\n",
            image.soft_scale
        ));
        header.push_str(&format!(
            "\\@2:Image Data: S [{0}] \"{0}\"\r\n",
            image.title
        ));
        offset += block.len();
        blocks.push(block);
    }
    if terminate {
        header.push_str("\\*File list end\r\n\x1a");
    }

    let mut bytes = latin1(&header);
    assert!(bytes.len() <= HEADER_SIZE, "test header too long");
    bytes.resize(HEADER_SIZE, 0);
    for block in blocks {
        bytes.extend(block);
    }
    bytes
}

fn build_file(images: &[TestImage]) -> Vec<u8> {
    build_file_with(images, "", true)
}

fn decode(bytes: Vec<u8>) -> ciao_spm::Result<SpmFile> {
    SpmFile::from_bytes(bytes, &UnitRegistry::default(), &DecodeOptions::default())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn test_decode_height_image() -> TestResult {
    let fixture = TestImage::new("Height", 2, 3, 4);
    let file = decode(build_file(&[fixture.clone()]))?;

    assert_eq!(file.images().len(), 1);
    let image = file.image(0)?;
    assert_eq!(image.title(), "Height");
    assert_eq!(image.shape(), (2, 3));
    assert_eq!(image.pixel_width(), PixelWidth::Four);
    assert_eq!(image.raw(), &fixture.expected_raw());

    // 1.2 V * 5.0 nm/V / 2^32
    assert_eq!(image.soft_scale().to_string(), "5.0 nm/V");
    assert_eq!(image.z_factor().unit().to_string(), "nm");
    let factor = 1.2 * 5.0 / 2f64.powi(32);
    assert!(close(*image.z_factor().magnitude(), factor));

    assert_eq!(image.data().unit().to_string(), "nm");
    for (raw, value) in image.raw().iter().zip(image.data().magnitude().iter()) {
        assert!(close(*value, *raw as f64 * factor));
    }
    Ok(())
}

#[test]
fn test_pixel_widths() -> TestResult {
    for (width, expected) in [
        (2, PixelWidth::Two),
        (4, PixelWidth::Four),
        (8, PixelWidth::Eight),
    ] {
        let fixture = TestImage::new("Height", 3, 2, width);
        let file = decode(build_file(&[fixture.clone()]))?;
        let image = file.image(0)?;

        assert_eq!(image.pixel_width(), expected);
        assert_eq!(image.raw(), &fixture.expected_raw());

        let factor = 1.2 * 5.0 / 2f64.powi(8 * width as i32);
        assert!(close(*image.z_factor().magnitude(), factor));
    }
    Ok(())
}

#[test]
fn test_odd_pixel_width_rejected() {
    let fixture = TestImage::new("Height", 2, 2, 3);
    let err = decode(build_file(&[fixture])).unwrap_err();
    assert!(matches!(
        err,
        SpmError::PixelWidth {
            data_length: 12,
            pixels: 4
        }
    ));
}

#[test]
fn test_overflowing_pixel_count_rejected() {
    let bytes = build_file(&[TestImage::new("Height", 2, 4, 2)]);
    let needle = b"\\Number of lines: 2\r\n";
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    let mut patched = bytes[..at].to_vec();
    patched.extend_from_slice(b"\\Number of lines: 4611686018427387904\r\n");
    patched.extend_from_slice(&bytes[at + needle.len()..]);

    let err = decode(patched).unwrap_err();
    assert!(matches!(err, SpmError::InvalidField { .. }));
}

#[test]
fn test_multiple_images() -> TestResult {
    let file = decode(build_file(&[
        TestImage::new("Height", 2, 2, 4),
        TestImage::new("Amplitude", 2, 2, 2),
        TestImage::new("Phase", 2, 2, 8),
    ]))?;

    assert_eq!(file.header().images().len(), file.images().len());
    assert_eq!(file.titles(), vec!["Height", "Amplitude", "Phase"]);

    let phase = file.image_by_title("Phase").ok_or("no phase image")?;
    assert_eq!(phase.pixel_width(), PixelWidth::Eight);
    assert!(file.image_by_title("Deflection").is_none());

    // per-image metadata with and without group numbers
    assert_eq!(
        phase.get("Image Data").and_then(HeaderEntry::text),
        Some("Phase")
    );
    assert!(phase.get("2:Z scale").is_some());
    assert!(phase.get("Z scale").is_some());
    Ok(())
}

#[test]
fn test_image_index_out_of_range() -> TestResult {
    let file = decode(build_file(&[
        TestImage::new("Height", 2, 2, 4),
        TestImage::new("Phase", 2, 2, 4),
    ]))?;

    let err = file.image(2).unwrap_err();
    assert!(matches!(err, SpmError::ImageIndex { index: 2, count: 2 }));
    assert!(err.to_string().contains("valid range is 0..2"));
    Ok(())
}

#[test]
fn test_missing_end_sentinel() {
    let bytes = build_file_with(&[TestImage::new("Height", 2, 2, 4)], "", false);
    let err = decode(bytes).unwrap_err();
    assert!(matches!(
        err,
        SpmError::FormatBoundary {
            missing: "\\*File list end"
        }
    ));
}

#[test]
fn test_aspect_ratio_orientations() -> TestResult {
    let file = decode(build_file(&[
        TestImage::new("Wide", 2, 4, 4).aspect(Some("1:2")),
        TestImage::new("Tall", 4, 2, 4).aspect(Some("2:1")),
        TestImage::new("Derived", 2, 4, 4).aspect(None),
    ]))?;

    let wide = file.image(0)?;
    assert!(close(*wide.width().magnitude(), 100.0));
    assert!(close(*wide.height().magnitude(), 50.0));
    assert_eq!(wide.width().unit().to_string(), "µm");
    assert!(close(*wide.pixel_size_x().magnitude(), 25.0));
    assert!(close(*wide.pixel_size_y().magnitude(), 25.0));
    assert_eq!(wide.extent(), [0.0, 100.0, 0.0, 50.0]);

    let tall = file.image(1)?;
    assert!(close(*tall.width().magnitude(), 50.0));
    assert!(close(*tall.height().magnitude(), 100.0));

    // without the field, the longer pixel axis spans the scan size
    let derived = file.image(2)?;
    assert_eq!(derived.extent(), wide.extent());
    assert_eq!(derived.x().magnitude().len(), 4);
    assert!(close(derived.x().magnitude()[3], 100.0));
    assert!(close(derived.y().magnitude()[1], 50.0));
    Ok(())
}

#[test]
fn test_meshgrid_follows_axes() -> TestResult {
    let file = decode(build_file(&[TestImage::new("Wide", 2, 4, 2).aspect(Some("1:2"))]))?;
    let image = file.image(0)?;
    let (grid_x, grid_y) = image.meshgrid();

    assert_eq!(grid_x.magnitude().dim(), (2, 4));
    assert_eq!(grid_y.magnitude().dim(), (2, 4));
    assert_eq!(grid_x.unit(), image.x().unit());
    for row in grid_x.magnitude().rows() {
        assert_eq!(row.to_owned(), *image.x().magnitude());
    }
    for column in grid_y.magnitude().columns() {
        assert_eq!(column.to_owned(), *image.y().magnitude());
    }
    Ok(())
}

#[test]
fn test_unresolved_soft_scale() {
    let fixture = TestImage::new("Height", 2, 2, 4).soft_scale("Sens. Missing");
    let err = decode(build_file(&[fixture])).unwrap_err();
    match err {
        SpmError::UnresolvedReference { name, scan_section } => {
            assert_eq!(name, "Sens. Missing");
            assert_eq!(scan_section, "Ciao scan list");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_data_out_of_bounds() {
    let mut bytes = build_file(&[TestImage::new("Height", 2, 2, 4)]);
    bytes.truncate(HEADER_SIZE + 4);
    let err = decode(bytes).unwrap_err();
    assert!(matches!(
        err,
        SpmError::DataOutOfBounds {
            offset: HEADER_SIZE,
            length: 16,
            ..
        }
    ));
}

#[test]
fn test_file_level_metadata() -> TestResult {
    let file = decode(build_file(&[TestImage::new("Height", 2, 2, 4)]))?;

    assert_eq!(file.get("Operating mode").and_then(HeaderEntry::text), Some("Tapping"));
    assert_eq!(file.get("Version").and_then(HeaderEntry::text), Some("0x09200201"));
    assert_eq!(
        file.get("Date").and_then(HeaderEntry::value).map(ToString::to_string),
        Some("02:34:11 PM Wed May 24 2023".to_string())
    );
    assert!(file.date().is_some());

    // Latin-1 0xB5 decodes to the micro sign
    let scan_size = file.get("Scan Size").and_then(HeaderEntry::value);
    assert_eq!(scan_size.map(ToString::to_string).as_deref(), Some("100.0 100.0 µm"));

    // group-less access to grouped keys
    assert!(file.get("Sens. Deflection").is_some());

    let groups = file.parameter_groups();
    let names = |group: Option<u32>| {
        groups
            .get(&group)
            .map(|params| params.iter().map(|p| p.name().to_string()).collect::<Vec<_>>())
            .unwrap_or_default()
    };
    assert_eq!(names(None), vec!["Sens. Zsens"]);
    assert_eq!(names(Some(2)), vec!["Sens. Deflection"]);
    Ok(())
}

#[test]
fn test_open_from_disk() -> TestResult {
    let bytes = build_file(&[
        TestImage::new("Height", 2, 2, 4),
        TestImage::new("Phase", 2, 2, 4),
    ]);
    let mut tmp = tempfile::Builder::new().suffix(".spm").tempfile()?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;

    let file = SpmFile::open(tmp.path())?;
    assert_eq!(file.path(), Some(tmp.path()));
    assert_eq!(file.bytes().len(), bytes.len());
    assert_eq!(file.titles(), vec!["Height", "Phase"]);

    let shown = file.to_string();
    assert!(shown.starts_with("SPM file: \""));
    assert!(shown.contains("02:34:11 PM Wed May 24 2023"));
    assert!(shown.contains("Images: [\"Height\", \"Phase\"]"));

    let summary = file.summary();
    assert!(summary.contains("Operating mode: Tapping"));
    assert!(summary.contains("AFM image \"Height\" [nm], (2, 2) px = (100.0, 100.0) µm"));
    Ok(())
}

#[test]
fn test_open_missing_file() {
    let err = SpmFile::open("/nonexistent/scan.spm").unwrap_err();
    assert!(matches!(err, SpmError::Io(_)));
}

#[test]
fn test_parallel_matches_sequential() -> TestResult {
    let fixtures: Vec<TestImage> = (0..6)
        .map(|i| TestImage::new("Height", 4 + i, 3, [2, 4, 8][i % 3]))
        .collect();
    let bytes = build_file(&fixtures);

    let units = UnitRegistry::default();
    let sequential = SpmFile::from_bytes(bytes.clone(), &units, &DecodeOptions::default())?;
    let parallel = SpmFile::from_bytes(
        bytes,
        &units,
        &DecodeOptions::builder().parallel(true).build(),
    )?;
    assert_eq!(sequential.images(), parallel.images());
    Ok(())
}

#[test]
fn test_image_arithmetic() -> TestResult {
    let file = decode(build_file(&[
        TestImage::new("Height", 2, 2, 4),
        TestImage::new("Height retrace", 2, 2, 2),
    ]))?;
    let trace = file.image(0)?.data();
    let retrace = file.image(1)?.data();

    // same counts, different bit depth: retrace is 2^16 times larger
    let ratio = retrace.try_div(trace)?;
    assert!(ratio.unit().is_dimensionless());
    assert!(ratio.magnitude().iter().all(|v| close(*v, 65536.0)));

    let difference = trace.try_sub(trace)?;
    assert!(difference.magnitude().iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn test_metadata_json() -> TestResult {
    let file = decode(build_file(&[TestImage::new("Height", 2, 2, 4)]))?;
    let json: serde_json::Value = serde_json::from_str(&file.metadata_json()?)?;

    assert_eq!(
        json["header"]["sections"]["Ciao scan list"]["Operating mode"],
        "Tapping"
    );
    assert_eq!(json["images"][0]["title"], "Height");
    assert_eq!(json["images"][0]["pixel_width"], "Four");
    assert_eq!(json["images"][0]["metadata"]["Samps/line"], 2);
    Ok(())
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_unknown_unit_warns_and_passes_through() -> TestResult {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let bytes = build_file_with(
        &[TestImage::new("Height", 2, 2, 4)],
        "\\Mystery: 3 FooBar\r\n",
        true,
    );
    let file = tracing::subscriber::with_default(subscriber, || decode(bytes))?;

    assert_eq!(
        file.get("Mystery").and_then(HeaderEntry::value),
        Some(&Value::Text("3 FooBar".to_string()))
    );
    let logs = String::from_utf8(buffer.0.lock().unwrap().clone())?;
    assert!(logs.contains("WARN"));
    assert!(logs.contains("FooBar"));
    Ok(())
}
