use crate::config::DecodeOptions;
use crate::error::{Result, SpmError};
use crate::parser::pixel_parser::{extract_pixel_block, parse_pixels};
use crate::processing::resolver::Resolver;
use crate::processing::scaler::{PixelGeometry, calibrate, z_scale_factor};
use crate::types::descriptor::ImageDescriptor;
use crate::types::header::Header;
use crate::types::image::CiaoImage;
use crate::types::pixel_data::PixelWidth;
use crate::types::quantity::Quantity;
use rayon::prelude::*;
use tracing::debug;

/// Decodes and calibrates the image described by the `index`-th image section.
///
/// # Arguments
/// * `header` - The assembled file header
/// * `index` - Position of the image section in file order
/// * `buffer` - The whole file; data offsets are relative to its start
/// * `options` - Section and parameter names to use
pub fn decode_image(
    header: &Header,
    index: usize,
    buffer: &[u8],
    options: &DecodeOptions,
) -> Result<CiaoImage> {
    let section = header.image(index).ok_or(SpmError::ImageIndex {
        index,
        count: header.images().len(),
    })?;
    let descriptor = ImageDescriptor::from_section(section, options)?;
    let resolver = Resolver::new(
        section,
        header.section(&options.scan_section),
        &options.scan_section,
    );

    let pixel_width = PixelWidth::infer(descriptor.data_length, descriptor.pixel_count()?)?;
    let block = extract_pixel_block(buffer, descriptor.data_offset, descriptor.data_length)?;
    let raw = parse_pixels(block, pixel_width, descriptor.rows, descriptor.cols)?;

    let soft_scale = match &descriptor.z_scale.soft_scale {
        Some(soft_scale) => resolver.resolve_soft_scale(soft_scale)?,
        None => Quantity::dimensionless(1.0),
    };
    let z_factor = z_scale_factor(descriptor.z_scale, &soft_scale, pixel_width)?;
    let data = calibrate(&raw, &z_factor);
    let geometry = PixelGeometry::resolve(&resolver, descriptor.rows, descriptor.cols)?;

    let title = descriptor
        .title
        .clone()
        .unwrap_or_else(|| format!("Ciao image {index}"));
    debug!(
        index,
        title = %title,
        rows = descriptor.rows,
        cols = descriptor.cols,
        pixel_width = pixel_width.bytes(),
        "Decoded image"
    );

    Ok(CiaoImage::builder()
        .title(title)
        .metadata(section.clone())
        .raw(raw)
        .pixel_width(pixel_width)
        .soft_scale(soft_scale)
        .z_factor(z_factor)
        .data(data)
        .geometry(geometry)
        .build())
}

/// Decodes every image section, in file order.
///
/// Each image reads a disjoint byte range, so with `options.parallel` the work
/// is spread over the rayon pool; the result order is the same either way.
pub fn decode_images(
    header: &Header,
    buffer: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<CiaoImage>> {
    let count = header.images().len();
    if options.parallel {
        (0..count)
            .into_par_iter()
            .map(|index| decode_image(header, index, buffer, options))
            .collect()
    } else {
        (0..count)
            .map(|index| decode_image(header, index, buffer, options))
            .collect()
    }
}
