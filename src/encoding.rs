//! Canonical byte encoding of the fields covered by a signature.
//!
//! Each field is written as an 8-byte little-endian length followed by its
//! bytes, after a domain tag that keeps certificate and request signatures
//! from being interchangeable.

pub(crate) const CERTIFICATE_DOMAIN: &[u8] = b"pki-tree/certificate/v1";
pub(crate) const REQUEST_DOMAIN: &[u8] = b"pki-tree/request/v1";

#[derive(Debug, Default)]
pub(crate) struct FieldEncoder {
    buffer: Vec<u8>,
}

impl FieldEncoder {
    pub(crate) fn new(domain: &[u8]) -> Self {
        let mut encoder = Self::default();
        encoder.bytes(domain);
        encoder
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) -> &mut Self {
        // usize fits in u64 on every supported target.
        let length = data.len() as u64;
        self.buffer.extend_from_slice(&length.to_le_bytes());
        self.buffer.extend_from_slice(data);
        self
    }

    pub(crate) fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub(crate) fn u64(&mut self, value: u64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub(crate) fn i64(&mut self, value: i64) -> &mut Self {
        self.bytes(&value.to_le_bytes())
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buffer
    }
}
