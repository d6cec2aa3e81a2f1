//! Binary encoding of counter records.
//!
//! Both record types are packed and little-endian:
//!
//! ```text
//! description: counter_id u32 | name_len u32 | name [u8; name_len]
//! sample:      collection_id u64 | counter_id u32 | timestamp u64 | value i64
//! ```
//!
//! A counter's description must be written before any of its samples.

use std::convert::TryInto;
use std::str;

use crate::error::{new_error, Error, ErrorKind};

/// Encoded size of a sample record.
pub const SAMPLE_RECORD_LEN: usize = 8 + 4 + 8 + 8;

/// Fixed part of a description record (id and name length).
pub const DESCRIPTION_HEADER_LEN: usize = 4 + 4;

/// Default capacity of a per-thread trace buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024 * 1024;

/// An append-only per-thread trace buffer.
///
/// The buffer never grows past its capacity. A record that does not fit is
/// rejected whole with [`BufferWriteFailed`] and nothing is written, so the
/// stream never holds a partial record.
///
/// [`BufferWriteFailed`]: ../error/enum.ErrorKind.html#variant.BufferWriteFailed
#[derive(Debug)]
pub struct TraceEncoder {
    collection_id: u64,
    buf: Vec<u8>,
    capacity: usize,
}

impl TraceEncoder {
    /// Create an encoder for the event collection `collection_id`, holding at
    /// most `capacity` bytes.
    pub fn new(collection_id: u64, capacity: usize) -> Self {
        Self {
            collection_id,
            buf: Vec::new(),
            capacity,
        }
    }

    /// The event collection samples written through this encoder belong to.
    pub fn collection_id(&self) -> u64 {
        self.collection_id
    }

    /// Maximum number of bytes the buffer holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing was written since creation or the last [`take`].
    ///
    /// [`take`]: #method.take
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The encoded records.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Take the encoded bytes, leaving the encoder empty.
    ///
    /// Used by the transport to flush the buffer.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Append the description of counter `counter_id`.
    pub fn write_description(&mut self, counter_id: u32, name: &str) -> Result<(), Error> {
        let name_len: u32 = name.len().try_into().map_err(|_| {
            new_error(ErrorKind::BufferWriteFailed)
                .with_context(format!("counter {} name too long", counter_id))
        })?;

        self.reserve(DESCRIPTION_HEADER_LEN + name.len())?;
        self.buf.extend_from_slice(&counter_id.to_le_bytes());
        self.buf.extend_from_slice(&name_len.to_le_bytes());
        self.buf.extend_from_slice(name.as_bytes());
        Ok(())
    }

    /// Append one counter value.
    pub fn write_sample(
        &mut self,
        collection_id: u64,
        counter_id: u32,
        timestamp: u64,
        value: i64,
    ) -> Result<(), Error> {
        self.reserve(SAMPLE_RECORD_LEN)?;
        self.buf.extend_from_slice(&collection_id.to_le_bytes());
        self.buf.extend_from_slice(&counter_id.to_le_bytes());
        self.buf.extend_from_slice(&timestamp.to_le_bytes());
        self.buf.extend_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Make room for `count` sample records, so a group of samples is either
    /// written whole or not at all.
    pub fn reserve_samples(&mut self, count: usize) -> Result<(), Error> {
        let n = count.checked_mul(SAMPLE_RECORD_LEN).ok_or_else(|| {
            new_error(ErrorKind::BufferWriteFailed).with_context(format!("{} samples", count))
        })?;
        self.reserve(n)
    }

    fn reserve(&mut self, n: usize) -> Result<(), Error> {
        let used = self.buf.len();
        let capacity = self.capacity;
        let full = move || {
            new_error(ErrorKind::BufferWriteFailed).with_context(format!(
                "{} byte record, {} of {} bytes used",
                n, used, capacity
            ))
        };

        match used.checked_add(n) {
            Some(end) if end <= capacity => (),
            _ => return Err(full()),
        }
        self.buf.try_reserve(n).map_err(|_| full())
    }
}

/// A decoded description record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDescription {
    /// ID referenced by the counter's samples.
    pub counter_id: u32,
    /// Counter name as configured.
    pub name: String,
}

/// A decoded sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
    /// Event collection (thread stream) of the sample.
    pub collection_id: u64,
    /// Counter the value belongs to.
    pub counter_id: u32,
    /// When the counters were read.
    pub timestamp: u64,
    /// Value accumulated since the last reset.
    pub value: i64,
}

/// Reads records back out of an encoded stream.
///
/// The stream carries no record type tags; the reader must know what comes
/// next (all descriptions are written before the samples).
#[derive(Debug)]
pub struct TraceReader<'a> {
    buf: &'a [u8],
}

impl<'a> TraceReader<'a> {
    /// Read records from the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Decode the next record as a description.
    pub fn read_description(&mut self) -> Result<CounterDescription, Error> {
        let counter_id = u32::from_le_bytes(self.array()?);
        let name_len = u32::from_le_bytes(self.array()?) as usize;
        let name = self.bytes(name_len)?;
        let name = str::from_utf8(name).map_err(|_| {
            new_error(ErrorKind::InvalidName).with_context(format!("counter {}", counter_id))
        })?;

        Ok(CounterDescription {
            counter_id,
            name: name.to_string(),
        })
    }

    /// Decode the next record as a sample.
    pub fn read_sample(&mut self) -> Result<CounterSample, Error> {
        if self.buf.len() < SAMPLE_RECORD_LEN {
            return Err(new_error(ErrorKind::TruncatedRecord));
        }

        Ok(CounterSample {
            collection_id: u64::from_le_bytes(self.array()?),
            counter_id: u32::from_le_bytes(self.array()?),
            timestamp: u64::from_le_bytes(self.array()?),
            value: i64::from_le_bytes(self.array()?),
        })
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.buf.len() < n {
            return Err(new_error(ErrorKind::TruncatedRecord));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        self.bytes(N)?
            .try_into()
            .map_err(|_| new_error(ErrorKind::TruncatedRecord))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_round_trip() {
        let mut enc = TraceEncoder::new(0, 1024);
        enc.write_description(3, "PAPI_TOT_CYC").unwrap();

        assert_eq!(enc.len(), DESCRIPTION_HEADER_LEN + "PAPI_TOT_CYC".len());

        let mut r = TraceReader::new(enc.as_bytes());
        let got = r.read_description().unwrap();
        assert_eq!(got.counter_id, 3);
        assert_eq!(got.name.as_bytes(), b"PAPI_TOT_CYC");
        assert!(r.is_empty());
    }

    #[test]
    fn test_description_layout() {
        let mut enc = TraceEncoder::new(0, 1024);
        enc.write_description(0x0102_0304, "ab").unwrap();

        assert_eq!(
            enc.as_bytes(),
            &[0x04, 0x03, 0x02, 0x01, 2, 0, 0, 0, b'a', b'b']
        );
    }

    #[test]
    fn test_sample_layout() {
        let mut enc = TraceEncoder::new(7, 1024);
        enc.write_sample(7, 2, 0x1122, -1).unwrap();

        let b = enc.as_bytes();
        assert_eq!(b.len(), SAMPLE_RECORD_LEN);
        assert_eq!(&b[0..8], &7u64.to_le_bytes());
        assert_eq!(&b[8..12], &2u32.to_le_bytes());
        assert_eq!(&b[12..20], &0x1122u64.to_le_bytes());
        assert_eq!(&b[20..28], &[0xff; 8]);

        let got = TraceReader::new(b).read_sample().unwrap();
        assert_eq!(
            got,
            CounterSample {
                collection_id: 7,
                counter_id: 2,
                timestamp: 0x1122,
                value: -1,
            }
        );
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut enc = TraceEncoder::new(1, SAMPLE_RECORD_LEN + 4);
        enc.write_sample(1, 0, 1, 1).unwrap();

        let err = enc.write_sample(1, 0, 2, 2).expect_err("expected full buffer");
        assert_eq!(err.kind(), &ErrorKind::BufferWriteFailed);
        assert!(err.is_fatal());

        // The rejected record is not partially written.
        assert_eq!(enc.len(), SAMPLE_RECORD_LEN);

        let err = enc
            .write_description(0, "cycles")
            .expect_err("expected full buffer");
        assert_eq!(err.kind(), &ErrorKind::BufferWriteFailed);
        assert_eq!(enc.len(), SAMPLE_RECORD_LEN);
    }

    #[test]
    fn test_reserve_samples() {
        let mut enc = TraceEncoder::new(1, 2 * SAMPLE_RECORD_LEN);
        enc.reserve_samples(2).unwrap();

        let err = enc.reserve_samples(3).expect_err("expected full buffer");
        assert_eq!(err.kind(), &ErrorKind::BufferWriteFailed);

        let err = enc.reserve_samples(usize::MAX).expect_err("expected overflow");
        assert_eq!(err.kind(), &ErrorKind::BufferWriteFailed);
        assert!(enc.is_empty());
    }

    #[test]
    fn test_take_resets() {
        let mut enc = TraceEncoder::new(1, SAMPLE_RECORD_LEN);
        enc.write_sample(1, 0, 1, 1).unwrap();

        let bytes = enc.take();
        assert_eq!(bytes.len(), SAMPLE_RECORD_LEN);
        assert!(enc.is_empty());

        // Room is available again after a flush.
        enc.write_sample(1, 0, 2, 2).unwrap();
    }

    #[test]
    fn test_truncated() {
        let mut enc = TraceEncoder::new(1, 1024);
        enc.write_description(1, "instructions").unwrap();
        let b = enc.as_bytes();

        let err = TraceReader::new(&b[..b.len() - 1])
            .read_description()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TruncatedRecord);

        let err = TraceReader::new(&[0; SAMPLE_RECORD_LEN - 1])
            .read_sample()
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TruncatedRecord);
    }

    #[test]
    fn test_invalid_name() {
        let mut b = vec![];
        b.extend_from_slice(&9u32.to_le_bytes());
        b.extend_from_slice(&2u32.to_le_bytes());
        b.extend_from_slice(&[0xff, 0xfe]);

        let err = TraceReader::new(&b).read_description().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidName);
    }

    #[test]
    fn test_mixed_stream() {
        let mut enc = TraceEncoder::new(4, 1024);
        enc.write_description(0, "cycles").unwrap();
        enc.write_description(1, "instructions").unwrap();
        enc.write_sample(4, 0, 200_000, 10).unwrap();
        enc.write_sample(4, 1, 200_000, 20).unwrap();

        let mut r = TraceReader::new(enc.as_bytes());
        assert_eq!(r.read_description().unwrap().name, "cycles");
        assert_eq!(r.read_description().unwrap().name, "instructions");
        assert_eq!(r.read_sample().unwrap().value, 10);
        assert_eq!(r.read_sample().unwrap().value, 20);
        assert_eq!(r.remaining(), 0);
    }
}
