//! Directory record codec
//!
//! Each record is 32 bytes:
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0      | 2    | magic `"WF"`                   |
//! | 2      | 1    | flags                          |
//! | 3      | 1    | name length (1..=16)           |
//! | 4      | 16   | name, padded with 0xFF         |
//! | 20     | 4    | start address, big-endian      |
//! | 24     | 4    | size, big-endian               |
//! | 28     | 4    | sequence number, big-endian    |
//!
//! A record that reads as all 0xFF marks the end of the log.

use bitflags::bitflags;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Size of one directory record
pub const RECORD_SIZE: usize = 32;

/// Longest file name in bytes
pub const MAX_NAME_LEN: usize = 16;

/// Record magic: "WF"
pub const RECORD_MAGIC: [u8; 2] = *b"WF";

/// File name as stored in the directory
pub type FileName = heapless::String<MAX_NAME_LEN>;

bitflags! {
    /// Record flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RecordFlags: u8 {
        /// Tombstone: the name was deleted
        const DELETED = 0x01;
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct RawRecord {
    magic: [u8; 2],
    flags: u8,
    name_len: u8,
    name: [u8; MAX_NAME_LEN],
    addr: U32,
    size: U32,
    seq: U32,
}

const _: () = assert!(core::mem::size_of::<RawRecord>() == RECORD_SIZE);

/// One decoded directory record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Record flags
    pub flags: RecordFlags,
    /// File name
    pub name: FileName,
    /// Start of the file data
    pub addr: u32,
    /// File size in bytes
    pub size: u32,
    /// Sequence number, higher wins
    pub seq: u32,
}

/// Outcome of decoding one directory slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Erased slot, the log ends here
    End,
    /// Damaged or foreign record, skip it
    Invalid,
    /// A valid record
    Record(Record),
}

impl Record {
    /// Live record pointing at file data
    pub fn live(name: &str, addr: u32, size: u32, seq: u32) -> Option<Self> {
        Some(Self {
            flags: RecordFlags::empty(),
            name: parse_name(name)?,
            addr,
            size,
            seq,
        })
    }

    /// Tombstone for a name
    pub fn tombstone(name: &str, seq: u32) -> Option<Self> {
        Some(Self {
            flags: RecordFlags::DELETED,
            name: parse_name(name)?,
            addr: 0,
            size: 0,
            seq,
        })
    }

    /// Returns true for a tombstone
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(RecordFlags::DELETED)
    }

    /// Serialize to the on-device layout
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut name = [0xFF; MAX_NAME_LEN];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        let raw = RawRecord {
            magic: RECORD_MAGIC,
            flags: self.flags.bits(),
            name_len: self.name.len() as u8,
            name,
            addr: U32::new(self.addr),
            size: U32::new(self.size),
            seq: U32::new(self.seq),
        };
        let mut out = [0u8; RECORD_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Parse one directory slot
    pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Decoded {
        if bytes.iter().all(|&b| b == 0xFF) {
            return Decoded::End;
        }
        let Ok(raw) = RawRecord::read_from_bytes(bytes) else {
            return Decoded::Invalid;
        };
        if raw.magic != RECORD_MAGIC {
            return Decoded::Invalid;
        }
        let len = raw.name_len as usize;
        if len == 0 || len > MAX_NAME_LEN {
            return Decoded::Invalid;
        }
        let Some(name) = core::str::from_utf8(&raw.name[..len])
            .ok()
            .and_then(parse_name)
        else {
            return Decoded::Invalid;
        };
        Decoded::Record(Self {
            flags: RecordFlags::from_bits_truncate(raw.flags),
            name,
            addr: raw.addr.get(),
            size: raw.size.get(),
            seq: raw.seq.get(),
        })
    }
}

/// Validate a file name and copy it into a [`FileName`]
pub fn parse_name(name: &str) -> Option<FileName> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return None;
    }
    let mut out = FileName::new();
    out.push_str(name).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        let rec = Record::live("boot.bin", 0x0001_0000, 0x1234, 7).unwrap();
        let bytes = rec.encode();
        assert_eq!(&bytes[0..4], &[b'W', b'F', 0x00, 8]);
        assert_eq!(&bytes[4..12], b"boot.bin");
        assert!(bytes[12..20].iter().all(|&b| b == 0xFF));
        assert_eq!(&bytes[20..24], &[0x00, 0x01, 0x00, 0x00]);
        assert_eq!(&bytes[24..28], &[0x00, 0x00, 0x12, 0x34]);
        assert_eq!(&bytes[28..32], &[0x00, 0x00, 0x00, 0x07]);
        assert_eq!(Record::decode(&bytes), Decoded::Record(rec));
    }

    #[test]
    fn test_tombstone_flag() {
        let rec = Record::tombstone("old", 3).unwrap();
        let bytes = rec.encode();
        assert_eq!(bytes[2], RecordFlags::DELETED.bits());
        match Record::decode(&bytes) {
            Decoded::Record(r) => assert!(r.is_deleted()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_end_and_invalid() {
        assert_eq!(Record::decode(&[0xFF; RECORD_SIZE]), Decoded::End);
        assert_eq!(Record::decode(&[0x00; RECORD_SIZE]), Decoded::Invalid);

        let mut bad_len = Record::live("a", 0, 0, 1).unwrap().encode();
        bad_len[3] = 17;
        assert_eq!(Record::decode(&bad_len), Decoded::Invalid);
        bad_len[3] = 0;
        assert_eq!(Record::decode(&bad_len), Decoded::Invalid);
    }

    #[test]
    fn test_name_limits() {
        assert!(parse_name("").is_none());
        assert!(parse_name("0123456789abcdef").is_some());
        assert!(parse_name("0123456789abcdefg").is_none());
    }
}
