//! Fixed-size binary layout for the fake SGX quote the simulator hands out
//! in lieu of a real hardware attestation. The structures mirror the shape
//! of Intel's actual `REPORT_BODY`/`QUOTE` layout closely enough that the
//! byte offsets look familiar, but only `mr_enclave`, `basename` and
//! `report_data` are ever populated or checked; everything else is fixed
//! zero padding.

use crate::error::{PoetError, Result};

/// A cursor over a byte slice that fails the whole parse as soon as it runs
/// out of bytes, rather than scattering bounds checks through the caller.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() >= self.pos + n {
            let slice = &self.bytes[self.pos..self.pos + n];
            self.pos += n;
            Ok(slice)
        } else {
            Err(PoetError::malformed("SGX structure is shorter than its STRUCT_SIZE"))
        }
    }
}

/// A 32-byte opaque basename identifying the quoting enclave's EPID group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgxBasename(pub [u8; Self::STRUCT_SIZE]);

impl SgxBasename {
    pub const STRUCT_SIZE: usize = 32;

    pub fn new(name: [u8; Self::STRUCT_SIZE]) -> Self {
        Self(name)
    }

    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn parse_from_bytes(cursor: &mut Cursor) -> Result<Self> {
        let bytes = cursor.take(Self::STRUCT_SIZE)?;
        let mut name = [0u8; Self::STRUCT_SIZE];
        name.copy_from_slice(bytes);
        Ok(Self(name))
    }
}

/// A 32-byte enclave measurement (`MRENCLAVE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgxMeasurement(pub [u8; Self::STRUCT_SIZE]);

impl SgxMeasurement {
    pub const STRUCT_SIZE: usize = 32;

    pub fn new(m: [u8; Self::STRUCT_SIZE]) -> Self {
        Self(m)
    }

    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn parse_from_bytes(cursor: &mut Cursor) -> Result<Self> {
        let bytes = cursor.take(Self::STRUCT_SIZE)?;
        let mut m = [0u8; Self::STRUCT_SIZE];
        m.copy_from_slice(bytes);
        Ok(Self(m))
    }
}

/// 64 bytes of report data, carried verbatim between enclave and verifier.
/// When the data being conveyed is shorter than 64 bytes (as it always is
/// here: a single SHA-256 digest), the unused tail is zero-filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgxReportData(pub [u8; Self::STRUCT_SIZE]);

impl SgxReportData {
    pub const STRUCT_SIZE: usize = 64;

    /// Build report data from a digest, zero-padding the remainder.
    pub fn from_digest(digest: &[u8]) -> Self {
        let mut d = [0u8; Self::STRUCT_SIZE];
        let n = digest.len().min(Self::STRUCT_SIZE);
        d[..n].copy_from_slice(&digest[..n]);
        Self(d)
    }

    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    pub fn parse_from_bytes(cursor: &mut Cursor) -> Result<Self> {
        let bytes = cursor.take(Self::STRUCT_SIZE)?;
        let mut d = [0u8; Self::STRUCT_SIZE];
        d.copy_from_slice(bytes);
        Ok(Self(d))
    }
}

/// The body of an SGX report. Real hardware fills in `cpu_svn`,
/// `misc_select`, `attributes`, `mr_signer`, `isv_prod_id` and `isv_svn` too;
/// the simulator only ever populates `mr_enclave` and `report_data` and
/// leaves the rest as the fixed zero padding those offsets would otherwise
/// hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgxReportBody {
    pub mr_enclave: SgxMeasurement,
    pub report_data: SgxReportData,
}

impl SgxReportBody {
    // cpu_svn(16) + misc_select(4) + reserved(28) + attributes(16)
    //   + mr_enclave(32) + reserved(32) + mr_signer(32) + reserved(96)
    //   + isv_prod_id(2) + isv_svn(2) + reserved(60) + report_data(64)
    pub const STRUCT_SIZE: usize = 384;

    pub fn new(mr_enclave: SgxMeasurement, report_data: SgxReportData) -> Self {
        Self { mr_enclave, report_data }
    }

    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::STRUCT_SIZE);
        out.extend_from_slice(&[0u8; 16]); // cpu_svn
        out.extend_from_slice(&[0u8; 4]); // misc_select
        out.extend_from_slice(&[0u8; 28]); // reserved
        out.extend_from_slice(&[0u8; 16]); // attributes
        out.extend_from_slice(&self.mr_enclave.serialize_to_bytes());
        out.extend_from_slice(&[0u8; 32]); // reserved
        out.extend_from_slice(&[0u8; 32]); // mr_signer
        out.extend_from_slice(&[0u8; 96]); // reserved
        out.extend_from_slice(&[0u8; 2]); // isv_prod_id
        out.extend_from_slice(&[0u8; 2]); // isv_svn
        out.extend_from_slice(&[0u8; 60]); // reserved
        out.extend_from_slice(&self.report_data.serialize_to_bytes());
        out
    }

    pub fn parse_from_bytes(cursor: &mut Cursor) -> Result<Self> {
        let _cpu_svn = cursor.take(16)?;
        let _misc_select = cursor.take(4)?;
        let _reserved = cursor.take(28)?;
        let _attributes = cursor.take(16)?;
        let mr_enclave = SgxMeasurement::parse_from_bytes(cursor)?;
        let _reserved = cursor.take(32)?;
        let _mr_signer = cursor.take(32)?;
        let _reserved = cursor.take(96)?;
        let _isv_prod_id = cursor.take(2)?;
        let _isv_svn = cursor.take(2)?;
        let _reserved = cursor.take(60)?;
        let report_data = SgxReportData::parse_from_bytes(cursor)?;
        Ok(Self { mr_enclave, report_data })
    }
}

/// The fake SGX quote handed out by the simulator: a basename identifying
/// the enclave's group plus the report body it is vouching for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgxQuote {
    pub basename: SgxBasename,
    pub report_body: SgxReportBody,
}

impl SgxQuote {
    pub const STRUCT_SIZE: usize = SgxBasename::STRUCT_SIZE + SgxReportBody::STRUCT_SIZE;

    pub fn new(basename: SgxBasename, report_body: SgxReportBody) -> Self {
        Self { basename, report_body }
    }

    pub fn serialize_to_bytes(&self) -> Vec<u8> {
        let mut out = self.basename.serialize_to_bytes();
        out.extend_from_slice(&self.report_body.serialize_to_bytes());
        out
    }

    pub fn parse_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::STRUCT_SIZE {
            return Err(PoetError::malformed(
                "SGX quote is shorter than its STRUCT_SIZE",
            ));
        }
        let mut cursor = Cursor::new(bytes);
        let basename = SgxBasename::parse_from_bytes(&mut cursor)?;
        let report_body = SgxReportBody::parse_from_bytes(&mut cursor)?;
        Ok(Self { basename, report_body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_quote() -> SgxQuote {
        let mut basename_bytes = [0u8; 32];
        basename_bytes[0] = 0xb7;
        basename_bytes[1] = 0x85;

        let mut measurement_bytes = [0u8; 32];
        measurement_bytes[31] = 0x4e;

        let digest = [7u8; 32];

        SgxQuote::new(
            SgxBasename::new(basename_bytes),
            SgxReportBody::new(
                SgxMeasurement::new(measurement_bytes),
                SgxReportData::from_digest(&digest),
            ),
        )
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let quote = sample_quote();
        let bytes = quote.serialize_to_bytes();
        assert_eq!(bytes.len(), SgxQuote::STRUCT_SIZE);
        let parsed = SgxQuote::parse_from_bytes(&bytes).unwrap();
        assert_eq!(parsed, quote);
    }

    #[test]
    fn report_data_zero_pads_a_short_digest() {
        let digest = [9u8; 32];
        let report_data = SgxReportData::from_digest(&digest);
        assert_eq!(&report_data.0[..32], &digest[..]);
        assert_eq!(&report_data.0[32..], &[0u8; 32][..]);
    }

    #[test]
    fn parse_fails_on_truncated_input() {
        let quote = sample_quote();
        let mut bytes = quote.serialize_to_bytes();
        bytes.truncate(SgxQuote::STRUCT_SIZE - 1);
        assert!(SgxQuote::parse_from_bytes(&bytes).is_err());
    }
}
