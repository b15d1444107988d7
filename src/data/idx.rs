use std::path::Path;

use crate::data::images::{ImageShape, RawImages};
use crate::error::{BenchError, Result};

/// Parse a pair of IDX binary files (image + label) as used by MNIST and its
/// derivatives into single-channel [`RawImages`].
///
/// # IDX3 image file layout
/// ```text
/// bytes  0-1:   0x00 0x00   (reserved, must be zero)
/// byte   2:     0x08        (dtype = uint8)
/// byte   3:     0x03        (number of dimensions = 3)
/// bytes  4-7:   N           (number of images, big-endian u32)
/// bytes  8-11:  rows        (image height in pixels, big-endian u32)
/// bytes 12-15:  cols        (image width in pixels, big-endian u32)
/// bytes 16..:   N * rows * cols bytes, row-major, uint8
/// ```
///
/// # IDX1 label file layout
/// ```text
/// bytes  0-1:   0x00 0x00   (reserved, must be zero)
/// byte   2:     0x08        (dtype = uint8)
/// byte   3:     0x01        (number of dimensions = 1)
/// bytes  4-7:   N           (number of labels, big-endian u32)
/// bytes  8..:   N bytes, each a class index in [0, n_classes)
/// ```
pub fn parse_idx_pair(image_bytes: &[u8], label_bytes: &[u8], n_classes: usize) -> Result<RawImages> {
    // ── Image file validation ───────────────────────────────────────────────

    check_header(image_bytes, 16, 3, "image")?;

    let n_items = be_u32(image_bytes, 4);
    let rows = be_u32(image_bytes, 8);
    let cols = be_u32(image_bytes, 12);

    let n_pixels = rows.checked_mul(cols).ok_or_else(|| {
        BenchError::dataset(format!(
            "IDX image file: rows * cols overflows usize (rows={}, cols={}).",
            rows, cols
        ))
    })?;
    let data_len = n_items.checked_mul(n_pixels).ok_or_else(|| {
        BenchError::dataset(format!(
            "IDX image file: n_items * n_pixels overflows usize (n_items={}, n_pixels={}).",
            n_items, n_pixels
        ))
    })?;

    if image_bytes.len() - 16 < data_len {
        return Err(BenchError::dataset(format!(
            "IDX image file too short: header declares {} items of {}×{} pixels \
             ({} data bytes needed after header), but file is only {} bytes total.",
            n_items, rows, cols, data_len, image_bytes.len()
        )));
    }

    // ── Label file validation ───────────────────────────────────────────────

    check_header(label_bytes, 8, 1, "label")?;

    let label_count = be_u32(label_bytes, 4);
    if label_count != n_items {
        return Err(BenchError::dataset(format!(
            "IDX file mismatch: image file declares {} items but label file declares {}.",
            n_items, label_count
        )));
    }
    if label_bytes.len() - 8 < n_items {
        return Err(BenchError::dataset(format!(
            "IDX label file too short: header declares {} labels but file is only {} bytes \
             (need at least {} bytes).",
            n_items, label_bytes.len(), 8 + n_items
        )));
    }

    if n_classes < 2 {
        return Err(BenchError::dataset(format!("n_classes must be at least 2, got {}.", n_classes)));
    }

    // ── Build labels ────────────────────────────────────────────────────────

    let mut labels = Vec::with_capacity(n_items);
    for (i, &class_idx) in label_bytes[8..8 + n_items].iter().enumerate() {
        let class = class_idx as usize;
        if class >= n_classes {
            return Err(BenchError::dataset(format!(
                "IDX label at index {}: class index {} is out of range for n_classes={}.",
                i, class, n_classes
            )));
        }
        labels.push(class);
    }

    Ok(RawImages {
        shape: ImageShape::new(1, rows, cols),
        pixels: image_bytes[16..16 + data_len].to_vec(),
        labels,
    })
}

/// Reads and parses an uncompressed IDX image/label file pair.
pub fn read_idx_pair(images: &Path, labels: &Path, n_classes: usize) -> Result<RawImages> {
    let image_bytes = std::fs::read(images)?;
    let label_bytes = std::fs::read(labels)?;
    parse_idx_pair(&image_bytes, &label_bytes, n_classes)
}

fn check_header(bytes: &[u8], header_len: usize, dims: u8, kind: &str) -> Result<()> {
    if bytes.len() < header_len {
        return Err(BenchError::dataset(format!(
            "IDX {} file too short: expected at least {} header bytes, got {}.",
            kind, header_len, bytes.len()
        )));
    }
    if bytes[0] != 0x00 || bytes[1] != 0x00 {
        return Err(BenchError::dataset(format!(
            "IDX {} file: bytes 0-1 must be 0x00 0x00 (reserved), got 0x{:02X} 0x{:02X}.",
            kind, bytes[0], bytes[1]
        )));
    }
    if bytes[2] != 0x08 {
        return Err(BenchError::dataset(format!(
            "IDX {} file: byte 2 (dtype) must be 0x08 (uint8), got 0x{:02X}.",
            kind, bytes[2]
        )));
    }
    if bytes[3] != dims {
        return Err(BenchError::dataset(format!(
            "IDX {} file: byte 3 (dimensions) must be {}, got {}.",
            kind, dims, bytes[3]
        )));
    }
    Ok(())
}

fn be_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}
