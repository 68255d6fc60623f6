//! Fixed little-endian wire encoding for the exchange rounds.
//!
//! Conventions (shared by the metadata and edge-stream protocols):
//! - All integers are LE fixed width; ids and counts are u64.
//! - Vectors are length-prefixed with a u64 count.
//! - Edge payloads travel as raw `bytemuck::Pod` byte runs.
//!
//! Decoding is fallible: a truncated buffer is a protocol error at the
//! call site, never a panic.

use bytemuck::Pod;

/// Append-only byte buffer for one outbound message.
#[derive(Default)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    #[inline]
    pub fn push_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Length-prefixed u64 vector.
    pub fn push_u64_slice(&mut self, vs: &[u64]) {
        self.push_u64(vs.len() as u64);
        for &v in vs {
            self.push_u64(v);
        }
    }

    /// Raw Pod run, no prefix; the caller encodes the element count.
    pub fn push_pod_slice<T: Pod>(&mut self, vs: &[T]) {
        if std::mem::size_of::<T>() > 0 {
            self.buf.extend_from_slice(bytemuck::cast_slice(vs));
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Decode error: the buffer ended before the requested run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    pub wanted: usize,
    pub remaining: usize,
}

impl std::fmt::Display for Truncated {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "truncated wire buffer: wanted {} bytes, {} remaining",
            self.wanted, self.remaining
        )
    }
}

/// Cursor over one received message.
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        if self.remaining() < n {
            return Err(Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    pub fn read_u64(&mut self) -> Result<u64, Truncated> {
        let b = self.take_bytes(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8-byte slice")))
    }

    pub fn read_u64_vec(&mut self) -> Result<Vec<u64>, Truncated> {
        let n = self.read_u64()? as usize;
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_u64()?);
        }
        Ok(out)
    }

    /// Raw Pod run of `n` elements (zero-sized payloads read nothing).
    pub fn read_pod_vec<T: Pod>(&mut self, n: usize) -> Result<Vec<T>, Truncated> {
        let sz = std::mem::size_of::<T>();
        if sz == 0 {
            return Ok(vec![T::zeroed(); n]);
        }
        let bytes = self.take_bytes(n * sz)?;
        let mut out = Vec::with_capacity(n);
        for chunk in bytes.chunks_exact(sz) {
            out.push(bytemuck::pod_read_unaligned(chunk));
        }
        Ok(out)
    }
}
