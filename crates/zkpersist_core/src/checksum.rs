//! Pluggable 32-bit checksums and checksumming stream adapters.
//!
//! Records and snapshots store their checksum as an `i64` holding a 32-bit
//! value. The algorithm is chosen per [`Config`](crate::Config) through a
//! [`ChecksumKind`] value.

use std::fmt;
use std::io::{self, Read, Write};

/// A running 32-bit checksum.
pub trait Checksum: Send {
    /// Feeds bytes into the checksum.
    fn update(&mut self, data: &[u8]);

    /// Returns the checksum of everything fed so far, zero-extended.
    fn value(&self) -> u64;

    /// Resets to the initial state.
    fn reset(&mut self);
}

/// Adler-32 as defined in RFC 1950.
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    const MOD: u32 = 65_521;
    /// Largest run before `b` could overflow a `u32`.
    const NMAX: usize = 5_552;

    /// Creates a fresh checksum.
    #[must_use]
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Checksum for Adler32 {
    fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(Self::NMAX) {
            for &byte in chunk {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= Self::MOD;
            self.b %= Self::MOD;
        }
    }

    fn value(&self) -> u64 {
        u64::from((self.b << 16) | self.a)
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

/// CRC-32 (IEEE) backed by `crc32fast`.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: crc32fast::Hasher,
}

impl Crc32 {
    /// Creates a fresh checksum.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc32").field("value", &self.value()).finish()
    }
}

impl Checksum for Crc32 {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn value(&self) -> u64 {
        u64::from(self.hasher.clone().finalize())
    }

    fn reset(&mut self) {
        self.hasher = crc32fast::Hasher::new();
    }
}

/// Selects the checksum algorithm used for records and snapshots.
#[derive(Debug, Clone, Copy)]
pub enum ChecksumKind {
    /// Adler-32, the default.
    Adler32,
    /// CRC-32 (IEEE).
    Crc32,
    /// A caller-supplied algorithm.
    Custom(fn() -> Box<dyn Checksum>),
}

impl ChecksumKind {
    /// Creates a fresh checksum of this kind.
    #[must_use]
    pub fn create(self) -> Box<dyn Checksum> {
        match self {
            Self::Adler32 => Box::new(Adler32::new()),
            Self::Crc32 => Box::new(Crc32::new()),
            Self::Custom(factory) => factory(),
        }
    }

    /// Computes the checksum of `data` in one shot.
    #[must_use]
    pub fn compute(self, data: &[u8]) -> u64 {
        let mut checksum = self.create();
        checksum.update(data);
        checksum.value()
    }
}

impl Default for ChecksumKind {
    fn default() -> Self {
        Self::Adler32
    }
}

/// A writer that checksums every byte passed through it.
pub struct ChecksumWriter<W: Write> {
    inner: W,
    checksum: Box<dyn Checksum>,
}

impl<W: Write> ChecksumWriter<W> {
    /// Wraps `inner`, starting a fresh checksum of `kind`.
    pub fn new(inner: W, kind: ChecksumKind) -> Self {
        Self {
            inner,
            checksum: kind.create(),
        }
    }

    /// Checksum of the bytes written so far.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.checksum.value()
    }

    /// Direct access to the inner writer; bytes written there are not
    /// checksummed.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.checksum.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// A reader that checksums every byte it hands out.
pub struct ChecksumReader<R: Read> {
    inner: R,
    checksum: Box<dyn Checksum>,
}

impl<R: Read> ChecksumReader<R> {
    /// Wraps `inner`, starting a fresh checksum of `kind`.
    pub fn new(inner: R, kind: ChecksumKind) -> Self {
        Self {
            inner,
            checksum: kind.create(),
        }
    }

    /// Checksum of the bytes read so far.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.checksum.value()
    }

    /// Direct access to the inner reader; bytes read there are not
    /// checksummed.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.checksum.update(&buf[..n]);
        Ok(n)
    }
}
