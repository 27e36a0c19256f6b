//! Format-tagged sample buffers

use crate::SampleFormat;

/// Contiguous run of samples in a native [`SampleFormat`].
///
/// Bytes are little-endian, `format.size()` bytes per sample, exactly as
/// they appear in the raw-sample region of a block file.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    format: SampleFormat,
    data: Vec<u8>,
}

impl SampleBuffer {
    /// Empty buffer
    pub fn new(format: SampleFormat) -> Self {
        Self {
            format,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(format: SampleFormat, len: usize) -> Self {
        Self {
            format,
            data: Vec::with_capacity(len * format.size()),
        }
    }

    /// Buffer of `len` silent samples
    pub fn zeroed(format: SampleFormat, len: usize) -> Self {
        Self {
            format,
            data: vec![0u8; len * format.size()],
        }
    }

    /// Wrap raw native bytes. Trailing bytes that do not form a full sample are dropped.
    pub fn from_bytes(format: SampleFormat, mut data: Vec<u8>) -> Self {
        let whole = data.len() - data.len() % format.size();
        data.truncate(whole);
        Self { format, data }
    }

    pub fn from_f32(format: SampleFormat, samples: &[f32]) -> Self {
        let size = format.size();
        let mut data = vec![0u8; samples.len() * size];
        for (chunk, &s) in data.chunks_exact_mut(size).zip(samples) {
            format.write_f32(s, chunk);
        }
        Self { format, data }
    }

    #[inline]
    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of samples
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.format.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Sample `index` as a float
    #[inline]
    pub fn get(&self, index: usize) -> f32 {
        let size = self.format.size();
        self.format.read_f32(&self.data[index * size..])
    }

    pub fn to_f32(&self) -> Vec<f32> {
        self.data
            .chunks_exact(self.format.size())
            .map(|chunk| self.format.read_f32(chunk))
            .collect()
    }

    /// Copy of samples `[start, start + len)`
    pub fn slice(&self, start: usize, len: usize) -> SampleBuffer {
        let size = self.format.size();
        Self {
            format: self.format,
            data: self.data[start * size..(start + len) * size].to_vec(),
        }
    }

    /// Append `other`, converting it to this buffer's format if needed
    pub fn extend_from(&mut self, other: &SampleBuffer) {
        if other.format == self.format {
            self.data.extend_from_slice(&other.data);
        } else {
            self.data.extend_from_slice(&other.convert(self.format).data);
        }
    }

    pub fn extend_silence(&mut self, len: usize) {
        self.data
            .resize(self.data.len() + len * self.format.size(), 0);
    }

    /// Overwrite samples starting at `offset` with `src` (converted if needed)
    pub fn write_at(&mut self, offset: usize, src: &SampleBuffer) {
        let size = self.format.size();
        let converted;
        let src = if src.format == self.format {
            src
        } else {
            converted = src.convert(self.format);
            &converted
        };
        self.data[offset * size..offset * size + src.data.len()].copy_from_slice(&src.data);
    }

    /// Zero samples `[offset, offset + len)`
    pub fn silence_range(&mut self, offset: usize, len: usize) {
        let size = self.format.size();
        self.data[offset * size..(offset + len) * size].fill(0);
    }

    /// Remove samples `[start, start + len)`
    pub fn remove_range(&mut self, start: usize, len: usize) {
        let size = self.format.size();
        self.data.drain(start * size..(start + len) * size);
    }

    /// Copy of this buffer in another format
    pub fn convert(&self, format: SampleFormat) -> SampleBuffer {
        if format == self.format {
            return self.clone();
        }
        let mut out = vec![0u8; self.len() * format.size()];
        for (dst, src) in out
            .chunks_exact_mut(format.size())
            .zip(self.data.chunks_exact(self.format.size()))
        {
            format.write_f32(self.format.read_f32(src), dst);
        }
        Self { format, data: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zeroed_and_len() {
        let buf = SampleBuffer::zeroed(SampleFormat::Int16, 10);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf.as_bytes().len(), 20);
        assert!(buf.to_f32().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_slice_and_extend() {
        let buf = SampleBuffer::from_f32(SampleFormat::Float32, &[0.1, 0.2, 0.3, 0.4]);
        let mut head = buf.slice(0, 2);
        head.extend_from(&buf.slice(3, 1));
        assert_eq!(head.to_f32(), vec![0.1, 0.2, 0.4]);
    }

    #[test]
    fn test_write_at_converts() {
        let mut dst = SampleBuffer::zeroed(SampleFormat::Int16, 4);
        let src = SampleBuffer::from_f32(SampleFormat::Float32, &[0.5, -0.5]);
        dst.write_at(1, &src);
        let values = dst.to_f32();
        assert_eq!(values[0], 0.0);
        assert_relative_eq!(values[1], 0.5);
        assert_relative_eq!(values[2], -0.5);
        assert_eq!(values[3], 0.0);
    }

    #[test]
    fn test_remove_and_silence() {
        let mut buf = SampleBuffer::from_f32(SampleFormat::Float32, &[1.0, 0.5, 0.25, 0.125]);
        buf.remove_range(1, 2);
        assert_eq!(buf.to_f32(), vec![1.0, 0.125]);

        buf.extend_silence(2);
        buf.silence_range(0, 1);
        assert_eq!(buf.to_f32(), vec![0.0, 0.125, 0.0, 0.0]);
    }

    #[test]
    fn test_convert_int24() {
        let buf = SampleBuffer::from_f32(SampleFormat::Float32, &[0.25, -1.0]);
        let converted = buf.convert(SampleFormat::Int24);
        assert_eq!(converted.format(), SampleFormat::Int24);
        assert_eq!(converted.as_bytes().len(), 8);
        assert_eq!(converted.to_f32(), vec![0.25, -1.0]);
    }

    #[test]
    fn test_from_bytes_drops_partial_sample() {
        let buf = SampleBuffer::from_bytes(SampleFormat::Int16, vec![1, 0, 2]);
        assert_eq!(buf.len(), 1);
    }
}
