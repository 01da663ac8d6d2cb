//! LAS/LAZ point-cloud inspector.
//!
//! Parses the LAS public header block directly; no point data is decoded
//! during metadata extraction. For uncompressed LAS files a bounded XYZ
//! sample can additionally be pulled from the point records and cached in
//! the `processed` category using an inspector-owned binary codec; the
//! cache itself never interprets those bytes.

use crate::Result;
use crate::cache::CacheStore;
use crate::error::LupeError;
use crate::plugins::traits::Inspector;
use crate::types::FileMetadata;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Point records included in a downsampled XYZ sample.
pub const SAMPLE_POINT_LIMIT: usize = 1000;

/// Cache variant tag for the XYZ sample blob.
const SAMPLE_VARIANT: &str = "xyz-sample";

const EXTENSIONS: &[&str] = &[".las", ".laz"];

const LAS_SIGNATURE: &[u8] = b"LASF";

/// Largest public header across LAS versions (1.4).
const HEADER_MAX_LEN: usize = 375;

/// Minimum header carrying the fields parsed here (through the z bounds).
const HEADER_MIN_LEN: usize = 227;

/// Compressed (LAZ) files flag this bit in the point data format id.
const LAZ_COMPRESSION_BIT: u8 = 0x80;

/// Inspector for LAS/LAZ point clouds.
#[derive(Debug, Default)]
pub struct PointCloudInspector;

impl PointCloudInspector {
    pub fn new() -> Self {
        Self
    }

    /// Read up to `max_points` XYZ triples from the start of the point data,
    /// applying the header's scale and offset.
    ///
    /// Only uncompressed LAS files are supported; LAZ point data cannot be
    /// decoded from the raw records.
    pub fn sample_points(&self, path: &Path, max_points: usize) -> Result<Vec<[f64; 3]>> {
        let header = read_header(path)?;
        if header.point_format & LAZ_COMPRESSION_BIT != 0 {
            return Err(LupeError::parsing("compressed LAZ point data cannot be sampled"));
        }
        if header.point_record_length < 12 {
            return Err(LupeError::parsing("point record too short for XYZ coordinates"));
        }

        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(header.point_data_offset as u64))?;

        let wanted = max_points.min(header.point_count as usize);
        let mut record = vec![0u8; header.point_record_length as usize];
        let mut points = Vec::with_capacity(wanted);

        for _ in 0..wanted {
            if file.read_exact(&mut record).is_err() {
                // Truncated point data; keep what was read.
                break;
            }
            let x = i32::from_le_bytes([record[0], record[1], record[2], record[3]]) as f64;
            let y = i32::from_le_bytes([record[4], record[5], record[6], record[7]]) as f64;
            let z = i32::from_le_bytes([record[8], record[9], record[10], record[11]]) as f64;
            points.push([
                x * header.x_scale + header.x_offset,
                y * header.y_scale + header.y_offset,
                z * header.z_scale + header.z_offset,
            ]);
        }

        Ok(points)
    }

    /// Cached wrapper around [`sample_points`](Self::sample_points).
    ///
    /// The sample is stored in the cache's `processed` category under this
    /// inspector's own variant tag and codec; whatever this inspector
    /// serializes, only this inspector deserializes.
    pub fn cached_sample(&self, cache: &CacheStore, path: &Path, max_points: usize) -> Result<Vec<[f64; 3]>> {
        if let Some(blob) = cache.get_processed(path, SAMPLE_VARIANT)
            && let Some(points) = decode_sample(&blob)
        {
            return Ok(points);
        }

        let points = self.sample_points(path, max_points)?;
        if let Err(e) = cache.set_processed(path, SAMPLE_VARIANT, &encode_sample(&points)) {
            tracing::warn!(path = %path.display(), "failed to cache point sample: {e}");
        }
        Ok(points)
    }
}

#[derive(Debug)]
struct LasHeader {
    version_major: u8,
    version_minor: u8,
    point_data_offset: u32,
    point_format: u8,
    point_record_length: u16,
    point_count: u64,
    x_scale: f64,
    y_scale: f64,
    z_scale: f64,
    x_offset: f64,
    y_offset: f64,
    z_offset: f64,
    max_x: f64,
    min_x: f64,
    max_y: f64,
    min_y: f64,
    max_z: f64,
    min_z: f64,
}

fn read_header(path: &Path) -> Result<LasHeader> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_MAX_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let data = &buf[..filled];

    if data.len() < LAS_SIGNATURE.len() || &data[..LAS_SIGNATURE.len()] != LAS_SIGNATURE {
        return Err(LupeError::parsing("missing LASF signature"));
    }
    if data.len() < HEADER_MIN_LEN {
        return Err(LupeError::parsing(format!(
            "truncated LAS header: {} of {HEADER_MIN_LEN} bytes",
            data.len()
        )));
    }

    let version_major = data[24];
    let version_minor = data[25];
    let point_data_offset = u32_at(data, 96);
    let point_format = data[104];
    let point_record_length = u16_at(data, 105);

    // LAS 1.4 moved the authoritative count to a 64-bit field; the legacy
    // 32-bit field reads zero for large files.
    let mut point_count = u32_at(data, 107) as u64;
    if point_count == 0 && version_major == 1 && version_minor >= 4 && data.len() >= 255 {
        point_count = u64_at(data, 247);
    }

    Ok(LasHeader {
        version_major,
        version_minor,
        point_data_offset,
        point_format,
        point_record_length,
        point_count,
        x_scale: f64_at(data, 131),
        y_scale: f64_at(data, 139),
        z_scale: f64_at(data, 147),
        x_offset: f64_at(data, 155),
        y_offset: f64_at(data, 163),
        z_offset: f64_at(data, 171),
        max_x: f64_at(data, 179),
        min_x: f64_at(data, 187),
        max_y: f64_at(data, 195),
        min_y: f64_at(data, 203),
        max_z: f64_at(data, 211),
        min_z: f64_at(data, 219),
    })
}

// Offsets below are bounds-checked by the HEADER_MIN_LEN guard above.

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn u64_at(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

fn f64_at(data: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}

/// Encode a sample as a point count followed by little-endian XYZ triples.
fn encode_sample(points: &[[f64; 3]]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + points.len() * 24);
    buf.extend_from_slice(&(points.len() as u64).to_le_bytes());
    for point in points {
        for coord in point {
            buf.extend_from_slice(&coord.to_le_bytes());
        }
    }
    buf
}

fn decode_sample(blob: &[u8]) -> Option<Vec<[f64; 3]>> {
    if blob.len() < 8 {
        return None;
    }
    let count = u64::from_le_bytes(blob[..8].try_into().ok()?) as usize;
    if blob.len() != 8 + count * 24 {
        return None;
    }
    let mut points = Vec::with_capacity(count);
    for chunk in blob[8..].chunks_exact(24) {
        points.push([
            f64_at(chunk, 0),
            f64_at(chunk, 8),
            f64_at(chunk, 16),
        ]);
    }
    Some(points)
}

impl Inspector for PointCloudInspector {
    fn name(&self) -> &str {
        "point-cloud"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn domain(&self) -> &str {
        "Geospatial"
    }

    fn extensions(&self) -> &[&str] {
        EXTENSIONS
    }

    fn description(&self) -> &str {
        "LAS/LAZ header metadata and downsampled XYZ previews"
    }

    fn author(&self) -> &str {
        "lupe developers"
    }

    /// LAS files carry their signature in the first four bytes; the
    /// extension is ignored entirely.
    fn probe(&self, path: &Path) -> bool {
        let Ok(mut file) = File::open(path) else {
            return false;
        };
        let mut signature = [0u8; 4];
        file.read_exact(&mut signature).is_ok() && signature == LAS_SIGNATURE
    }

    fn extract(&self, path: &Path) -> Result<FileMetadata> {
        let file_size = std::fs::metadata(path)?.len();
        let file_name = path.file_name().unwrap_or_default().to_string_lossy().into_owned();
        let header = read_header(path)?;

        let version = format!("{}.{}", header.version_major, header.version_minor);
        let compressed = header.point_format & LAZ_COMPRESSION_BIT != 0;

        Ok(FileMetadata::new(
            file_name,
            file_size,
            "LAS Point Cloud",
            format!("{} points, LAS {version}", header.point_count),
        )
        .with("version", version)
        .with("point_format", (header.point_format & !LAZ_COMPRESSION_BIT) as u64)
        .with("point_record_length", header.point_record_length as u64)
        .with("point_count", header.point_count)
        .with("compressed", compressed)
        .with("x_scale", header.x_scale)
        .with("y_scale", header.y_scale)
        .with("z_scale", header.z_scale)
        .with("x_min", header.min_x)
        .with("x_max", header.max_x)
        .with("y_min", header.min_y)
        .with("y_max", header.max_y)
        .with("z_min", header.min_z)
        .with("z_max", header.max_z))
    }
}
