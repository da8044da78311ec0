//! The `.iblenv` container format.
//!
//! Layout (all integers little-endian `u32`):
//!
//! ```text
//! [magic 0x78b85411][version][compression][base_size][levels (1.002.000+)][payload]
//! ```
//!
//! The payload is the RGBE encoding of [`IblEnv::all`], optionally wrapped in an LZ4
//! frame. Version 1.001.000 files have no level count and hold a single level; they are
//! upgraded in memory while reading.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::cubemap;
use crate::env::IblEnv;
use crate::error::{IblError, Result};
use crate::rgbe;

/// Magic number at the start of every `.iblenv` file.
pub const MAGIC: u32 = 0x78b8_5411;

/// Highest LZ4 compression level accepted by [`Compression::Lz4`].
pub const MAX_LZ4_LEVEL: u32 = 9;

/// On-disk schema versions, encoded as `major * 1_000_000 + minor * 1_000 + patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Version {
    /// Single level, no level count in the header.
    V1_001_000 = 1_001_000,
    /// Multi-level.
    V1_002_000 = 1_002_000,
}

impl Version {
    /// The version written by [`encode`].
    pub const CURRENT: Version = Version::V1_002_000;

    /// Parses a version number.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::UnsupportedVersion`] for unknown versions.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            1_001_000 => Ok(Self::V1_001_000),
            1_002_000 => Ok(Self::V1_002_000),
            other => Err(IblError::UnsupportedVersion(other)),
        }
    }

    /// Size of the header for this version in bytes.
    #[must_use]
    pub fn header_len(self) -> usize {
        match self {
            Self::V1_001_000 => 16,
            Self::V1_002_000 => 20,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let v = *self as u32;
        write!(f, "{}.{:03}.{:03}", v / 1_000_000, v / 1_000 % 1_000, v % 1_000)
    }
}

/// Compression id stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CompressionKind {
    /// Raw RGBE payload.
    None = 0,
    /// LZ4 frame written in fast mode.
    Lz4Fast = 1,
    /// LZ4 frame written with an explicit level.
    Lz4 = 2,
}

impl CompressionKind {
    /// Parses a compression id.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::UnsupportedCompression`] for unknown ids.
    pub fn from_u32(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4Fast),
            2 => Ok(Self::Lz4),
            other => Err(IblError::UnsupportedCompression(other)),
        }
    }
}

/// Payload compression used when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression.
    #[default]
    None,
    /// LZ4 fast mode.
    Lz4Fast,
    /// LZ4 with a level in `1..=9`.
    Lz4 {
        /// Compression level.
        level: u32,
    },
}

impl Compression {
    /// Maps an encoder level: 0 is LZ4 fast mode, higher values select LZ4 levels
    /// (clamped to [`MAX_LZ4_LEVEL`]).
    #[must_use]
    pub fn from_level(level: u32) -> Self {
        if level == 0 {
            Self::Lz4Fast
        } else {
            Self::Lz4 {
                level: level.min(MAX_LZ4_LEVEL),
            }
        }
    }

    /// Maps the command line scale `0..=10`: 0 disables compression, 1 is fast mode and
    /// `n >= 2` is LZ4 level `n - 1`.
    #[must_use]
    pub fn from_cli_level(level: u32) -> Self {
        match level {
            0 => Self::None,
            n => Self::from_level(n - 1),
        }
    }

    /// The id written to the header.
    #[must_use]
    pub fn kind(self) -> CompressionKind {
        match self {
            Self::None => CompressionKind::None,
            Self::Lz4Fast => CompressionKind::Lz4Fast,
            Self::Lz4 { .. } => CompressionKind::Lz4,
        }
    }
}

/// Options for [`encode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    compression: Option<Compression>,
}

impl EncodeOptions {
    /// Options for an uncompressed file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables compression at an encoder level (see [`Compression::from_level`]).
    ///
    /// # Errors
    ///
    /// Returns [`IblError::EncodeConfigConflict`] if compression was already configured.
    pub fn compress(self, level: u32) -> Result<Self> {
        self.compression(Compression::from_level(level))
    }

    /// Sets the compression explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::EncodeConfigConflict`] if compression was already configured.
    pub fn compression(mut self, compression: Compression) -> Result<Self> {
        if self.compression.is_some() {
            return Err(IblError::EncodeConfigConflict);
        }
        self.compression = Some(compression);
        Ok(self)
    }

    /// The configured compression.
    #[must_use]
    pub fn selected_compression(&self) -> Compression {
        self.compression.unwrap_or_default()
    }
}

/// A decoded header, always in the current layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The version the file was written with.
    pub version: Version,
    /// Payload compression.
    pub compression: CompressionKind,
    /// Per-side resolution of level 0.
    pub base_size: u32,
    /// Number of levels.
    pub levels: u32,
}

/// Header layout of version 1.001.000.
#[derive(Debug, Clone, Copy)]
struct LegacyHeader {
    compression: CompressionKind,
    base_size: u32,
}

impl LegacyHeader {
    /// Converts to the current layout. Legacy files always hold exactly one level.
    fn upgrade(self) -> Header {
        Header {
            version: Version::V1_001_000,
            compression: self.compression,
            base_size: self.base_size,
            levels: 1,
        }
    }
}

fn read_u32s<R: Read, const N: usize>(reader: &mut R, offset: usize) -> Result<[u32; N]> {
    let mut bytes = vec![0u8; N * 4];
    let n = rgbe::read_up_to(reader, &mut bytes)?;
    if n < bytes.len() {
        return Err(IblError::DecodeTruncated {
            expected: offset + bytes.len(),
            actual: offset + n,
        });
    }
    let mut out = [0u32; N];
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(4)) {
        *value = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Ok(out)
}

impl Header {
    /// Reads and validates a header of any supported version.
    ///
    /// # Errors
    ///
    /// Returns [`IblError::CorruptHeader`] on a magic mismatch,
    /// [`IblError::UnsupportedVersion`] / [`IblError::UnsupportedCompression`] for unknown
    /// ids and [`IblError::DecodeTruncated`] if the stream is too short.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let [magic, version, compression, base_size] = read_u32s::<_, 4>(reader, 0)?;
        if magic != MAGIC {
            return Err(IblError::CorruptHeader);
        }

        let version = Version::from_u32(version)?;
        let compression = CompressionKind::from_u32(compression)?;
        match version {
            Version::V1_001_000 => {
                log::debug!("upgrading environment header from version {version}");
                Ok(LegacyHeader {
                    compression,
                    base_size,
                }
                .upgrade())
            }
            Version::V1_002_000 => {
                let [levels] = read_u32s::<_, 1>(reader, 16)?;
                Ok(Self {
                    version,
                    compression,
                    base_size,
                    levels,
                })
            }
        }
    }

    /// Writes the header in the current layout, whatever `self.version` says.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let fields = [
            MAGIC,
            Version::CURRENT as u32,
            self.compression as u32,
            self.base_size,
            self.levels,
        ];
        for field in fields {
            writer.write_all(&field.to_le_bytes())?;
        }
        Ok(())
    }

    /// Size of the RGBE payload in bytes (before compression).
    ///
    /// Returns `None` when the header describes more data than one buffer can hold.
    #[must_use]
    pub fn payload_len(&self) -> Option<usize> {
        cubemap::checked_cube_map_pixels(self.base_size, self.levels.max(1))?
            .checked_mul(4)
            .filter(|&len| len <= isize::MAX.unsigned_abs() / 4)
    }
}

/// Decodes an environment from `reader`.
///
/// # Errors
///
/// Header errors as in [`Header::read`], [`IblError::ZeroSizeInput`] for a zero base size,
/// [`IblError::CorruptHeader`] for a level count or size no buffer could hold,
/// [`IblError::DecodeTruncated`] if the payload is short, and I/O errors.
pub fn decode<R: Read>(mut reader: R) -> Result<IblEnv> {
    let header = Header::read(&mut reader)?;
    if header.base_size == 0 {
        return Err(IblError::ZeroSizeInput);
    }
    let levels = header.levels.max(1);
    if levels > cubemap::max_levels(header.base_size) {
        return Err(IblError::CorruptHeader);
    }

    let expected = header.payload_len().ok_or(IblError::CorruptHeader)?;
    let mut payload: Box<dyn Read + '_> = match header.compression {
        CompressionKind::None => Box::new(&mut reader),
        CompressionKind::Lz4Fast | CompressionKind::Lz4 => Box::new(lz4::Decoder::new(&mut reader)?),
    };

    let mut limited = (&mut payload).take(expected as u64);
    let pixels = rgbe::decode_from_reader(&mut limited, IblEnv::CHANNELS)?;
    let actual = pixels.len() / IblEnv::CHANNELS * 4;
    if actual != expected {
        return Err(IblError::DecodeTruncated { expected, actual });
    }

    IblEnv::new(pixels, header.base_size, levels)
}

/// Encodes `env` into `writer`.
///
/// # Errors
///
/// Propagates I/O and compression errors.
pub fn encode<W: Write>(mut writer: W, env: &IblEnv, options: &EncodeOptions) -> Result<()> {
    let compression = options.selected_compression();
    let header = Header {
        version: Version::CURRENT,
        compression: compression.kind(),
        base_size: env.base_size(),
        levels: env.levels(),
    };
    header.write(&mut writer)?;

    match compression {
        Compression::None => rgbe::encode_to_writer(&mut writer, env.all(), IblEnv::CHANNELS)?,
        Compression::Lz4Fast | Compression::Lz4 { .. } => {
            let level = match compression {
                Compression::Lz4 { level } => level,
                _ => 0,
            };
            let mut encoder = lz4::EncoderBuilder::new().level(level).build(&mut writer)?;
            rgbe::encode_to_writer(&mut encoder, env.all(), IblEnv::CHANNELS)?;
            let (_, result) = encoder.finish();
            result?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Encodes `env` into a byte vector.
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_to_vec(env: &IblEnv, options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(&mut out, env, options)?;
    Ok(out)
}

/// Reads an environment file.
///
/// # Errors
///
/// Same as [`decode`], plus errors opening the file.
pub fn decode_file(path: impl AsRef<Path>) -> Result<IblEnv> {
    let file = File::open(path.as_ref())?;
    decode(BufReader::new(file))
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes an environment file.
///
/// The data is written to a sibling `.partial` file which is renamed into place once
/// complete, so a failed write never leaves a truncated file at `path`.
///
/// # Errors
///
/// Same as [`encode`], plus file system errors.
pub fn encode_file(path: impl AsRef<Path>, env: &IblEnv, options: &EncodeOptions) -> Result<()> {
    let path = path.as_ref();
    let tmp = partial_path(path);

    let written = File::create(&tmp)
        .map_err(IblError::from)
        .and_then(|file| encode(BufWriter::new(file), env, options));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })?;
    Ok(())
}

/// Re-encodes an environment of any supported version in the current version.
///
/// # Errors
///
/// Same as [`decode`] and [`encode`].
pub fn update<R: Read, W: Write>(reader: R, writer: W, options: &EncodeOptions) -> Result<IblEnv> {
    let env = decode(reader)?;
    encode(writer, &env, options)?;
    Ok(env)
}
