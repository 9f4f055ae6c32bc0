//! Decoder for `FILE_NOTIFY_INFORMATION` buffers
//!
//! Each record in a change buffer is laid out as:
//!
//! ```text
//! offset 0   next_entry_offset  u32 LE   bytes from this record to the next, 0 = last
//! offset 4   action             u32 LE   FILE_ACTION_* code
//! offset 8   name_length        u32 LE   length of `name` in bytes
//! offset 12  name               [u16]    UTF-16LE, relative to the watched root
//! ```
//!
//! The decoder is a cursor over the bytes. Every declared offset and length is
//! checked against what remains before it is followed.

use thiserror::Error;

pub const FILE_ACTION_ADDED: u32 = 1;
pub const FILE_ACTION_REMOVED: u32 = 2;
pub const FILE_ACTION_MODIFIED: u32 = 3;
pub const FILE_ACTION_RENAMED_OLD_NAME: u32 = 4;
pub const FILE_ACTION_RENAMED_NEW_NAME: u32 = 5;

/// Fixed part of a record before the name
const HEADER_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("record at offset {offset} is truncated ({remaining} bytes left)")]
    Truncated { offset: usize, remaining: usize },

    #[error("record at offset {offset} declares name length {name_len} past the end of the buffer")]
    NameOverrun { offset: usize, name_len: usize },

    #[error("record at offset {offset} has odd name length {name_len}")]
    OddNameLength { offset: usize, name_len: usize },

    #[error("record at offset {offset} points to next entry {next} outside the buffer")]
    BadNextOffset { offset: usize, next: usize },
}

/// One decoded record: raw action code plus the name relative to the watched root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyRecord {
    pub action: u32,
    pub name: String,
}

/// Iterator over the records in a change buffer.
///
/// Yields `Err` at most once, after which it is exhausted.
pub struct NotifyRecords<'a> {
    buf: &'a [u8],
    offset: Option<usize>,
    pending: Option<DecodeError>,
}

impl<'a> NotifyRecords<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: if buf.is_empty() { None } else { Some(0) },
            pending: None,
        }
    }

    fn read_u32(&self, at: usize) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.buf[at..at + 4]);
        u32::from_le_bytes(word)
    }

    /// Decode the record at `offset`. A bad link to the next record does not
    /// invalidate this one; it is returned as the second element instead.
    fn decode_at(
        &self,
        offset: usize,
    ) -> Result<(NotifyRecord, Result<Option<usize>, DecodeError>), DecodeError> {
        let remaining = self.buf.len() - offset;
        if remaining < HEADER_LEN {
            return Err(DecodeError::Truncated { offset, remaining });
        }

        let next = self.read_u32(offset) as usize;
        let action = self.read_u32(offset + 4);
        let name_len = self.read_u32(offset + 8) as usize;

        if name_len % 2 != 0 {
            return Err(DecodeError::OddNameLength { offset, name_len });
        }
        if name_len > remaining - HEADER_LEN {
            return Err(DecodeError::NameOverrun { offset, name_len });
        }

        let name_start = offset + HEADER_LEN;
        let units: Vec<u16> = self.buf[name_start..name_start + name_len]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let record = NotifyRecord {
            action,
            name: String::from_utf16_lossy(&units),
        };

        if next == 0 {
            return Ok((record, Ok(None)));
        }
        // The next record must start past this one's header and inside the buffer
        if next < HEADER_LEN || next >= remaining {
            return Ok((record, Err(DecodeError::BadNextOffset { offset, next })));
        }
        Ok((record, Ok(Some(offset + next))))
    }
}

impl Iterator for NotifyRecords<'_> {
    type Item = Result<NotifyRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        let offset = self.offset.take()?;
        match self.decode_at(offset) {
            Ok((record, Ok(next))) => {
                self.offset = next;
                Some(Ok(record))
            }
            Ok((record, Err(e))) => {
                self.pending = Some(e);
                Some(Ok(record))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Decode a whole buffer. Records before a malformed one are returned along
/// with the error that ended the batch.
pub fn decode_buffer(buf: &[u8]) -> (Vec<NotifyRecord>, Option<DecodeError>) {
    let mut records = Vec::new();
    for item in NotifyRecords::new(buf) {
        match item {
            Ok(record) => records.push(record),
            Err(e) => return (records, Some(e)),
        }
    }
    (records, None)
}

/// Encode records in the same layout, each aligned to 4 bytes.
#[cfg(test)]
pub(crate) fn encode_records(records: &[(u32, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    for (i, (action, name)) in records.iter().enumerate() {
        let name_bytes: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let mut len = HEADER_LEN + name_bytes.len();
        len += (4 - len % 4) % 4;
        let next = if i + 1 == records.len() { 0 } else { len as u32 };

        let start = buf.len();
        buf.extend_from_slice(&next.to_le_bytes());
        buf.extend_from_slice(&action.to_le_bytes());
        buf.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&name_bytes);
        buf.resize(start + len, 0);
    }
    buf
}
