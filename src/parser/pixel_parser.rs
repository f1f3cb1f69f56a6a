use crate::error::{Result, SpmError};
use crate::types::pixel_data::{PixelWidth, pixel_count};
use ndarray::{Array2, s};
use winnow::{
    Parser,
    binary::{le_i16, le_i32, le_i64},
    combinator::repeat,
    error::ContextError,
};

/// Slice the `[offset, offset + length)` block out of the file buffer
pub fn extract_pixel_block(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    let out_of_bounds = || SpmError::DataOutOfBounds {
        offset,
        length,
        size: buffer.len(),
    };
    let end = offset.checked_add(length).ok_or_else(out_of_bounds)?;
    buffer.get(offset..end).ok_or_else(out_of_bounds)
}

/// Parses `count` little-endian signed integers of the given width
pub fn parse_pixel_values(
    input: &mut &[u8],
    width: PixelWidth,
    count: usize,
) -> std::result::Result<Vec<i64>, ContextError> {
    match width {
        PixelWidth::Two => repeat(count, le_i16.map(i64::from)).parse_next(input),
        PixelWidth::Four => repeat(count, le_i32.map(i64::from)).parse_next(input),
        PixelWidth::Eight => repeat(count, le_i64).parse_next(input),
    }
}

/// Decodes a pixel block into a `rows x cols` array.
///
/// Pixels are stored row-major with the bottom scan line first, so the row order
/// is reversed to put the first row at the top.
pub fn parse_pixels(block: &[u8], width: PixelWidth, rows: usize, cols: usize) -> Result<Array2<i64>> {
    let count = pixel_count(rows, cols)?;
    let mut input = block;
    let values = parse_pixel_values(&mut input, width, count)
        .map_err(|e| SpmError::Decode(format!("{count} pixels of {width}: {e:?}")))?;

    let array = Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| SpmError::Decode(e.to_string()))?;
    Ok(array.slice(s![..;-1, ..]).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_extract_block_bounds() {
        let buffer = [0u8; 16];
        assert_eq!(extract_pixel_block(&buffer, 8, 8).map(<[u8]>::len).ok(), Some(8));
        assert!(matches!(
            extract_pixel_block(&buffer, 8, 9),
            Err(SpmError::DataOutOfBounds {
                offset: 8,
                length: 9,
                size: 16
            })
        ));
        assert!(extract_pixel_block(&buffer, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_parse_i16_flips_rows() -> Result<()> {
        let values: [i16; 6] = [1, 2, 3, -4, -5, -6];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

        let pixels = parse_pixels(&bytes, PixelWidth::Two, 2, 3)?;
        assert_eq!(pixels, array![[-4, -5, -6], [1, 2, 3]]);
        Ok(())
    }

    #[test]
    fn test_parse_i32_and_i64() -> Result<()> {
        let values: [i32; 4] = [i32::MIN, -1, 0, i32::MAX];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let pixels = parse_pixels(&bytes, PixelWidth::Four, 2, 2)?;
        assert_eq!(pixels, array![[0, i32::MAX as i64], [i32::MIN as i64, -1]]);

        let values: [i64; 2] = [i64::MIN, 42];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let pixels = parse_pixels(&bytes, PixelWidth::Eight, 1, 2)?;
        assert_eq!(pixels, array![[i64::MIN, 42]]);
        Ok(())
    }

    #[test]
    fn test_truncated_block() {
        let bytes = [0u8; 6];
        assert!(matches!(
            parse_pixels(&bytes, PixelWidth::Two, 2, 2),
            Err(SpmError::Decode(_))
        ));
    }

    #[test]
    fn test_overflowing_shape() {
        let bytes = [0u8; 8];
        assert!(matches!(
            parse_pixels(&bytes, PixelWidth::Two, 1 << 62, 4),
            Err(SpmError::InvalidField { .. })
        ));
    }
}
