use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::Result;
use crate::schema::TranscriptRecord;

/// A record together with the byte range of its line
#[derive(Debug, Clone, PartialEq)]
pub struct TailedRecord {
    pub record: TranscriptRecord,
    /// Offset of the first byte of the line
    pub start_offset: u64,
    /// Offset just past the line's newline
    pub end_offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadBatch {
    pub records: Vec<TailedRecord>,
    /// Where the next read should start
    pub next_offset: u64,
    /// The first line was an unparseable fragment and was skipped
    pub skipped_fragment: bool,
    /// Complete lines consumed without yielding a record
    pub discarded: usize,
}

/// Read the records appended to `path` since `from_offset`.
///
/// Only newline-terminated lines that parse are consumed. The first line of
/// a read may be the tail of a record whose start was consumed earlier (the
/// previous offset landed mid-line while the agent was writing); it is
/// skipped but its bytes are consumed. Any later line that fails to parse is
/// treated as still being written: reading stops in front of it so the next
/// poll retries from there.
///
/// A missing file, or one no longer than `from_offset`, yields nothing and
/// leaves the offset unchanged.
pub fn read_new(path: &Path, from_offset: u64) -> Result<ReadBatch> {
    let unchanged = ReadBatch {
        next_offset: from_offset,
        ..Default::default()
    };

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(unchanged),
        Err(err) => return Err(err.into()),
    };

    let size = file.metadata()?.len();
    if size <= from_offset {
        return Ok(unchanged);
    }

    file.seek(SeekFrom::Start(from_offset))?;
    let mut buf = Vec::with_capacity((size - from_offset) as usize);
    file.take(size - from_offset).read_to_end(&mut buf)?;

    Ok(parse_chunk(&buf, from_offset))
}

fn parse_chunk(buf: &[u8], base_offset: u64) -> ReadBatch {
    let mut batch = ReadBatch {
        next_offset: base_offset,
        ..Default::default()
    };

    let mut pos = 0usize;
    let mut first = true;

    while pos < buf.len() {
        let Some(newline) = buf[pos..].iter().position(|&b| b == b'\n') else {
            // Unterminated tail: the writer has not finished this line
            break;
        };

        let line = &buf[pos..pos + newline];
        let start_offset = base_offset + pos as u64;
        let end_offset = start_offset + newline as u64 + 1;
        let is_first = std::mem::replace(&mut first, false);

        if line.iter().all(u8::is_ascii_whitespace) {
            pos += newline + 1;
            batch.next_offset = end_offset;
            continue;
        }

        match serde_json::from_slice::<serde_json::Value>(line) {
            Ok(value) => {
                match TranscriptRecord::from_value(value) {
                    Some(record) => batch.records.push(TailedRecord {
                        record,
                        start_offset,
                        end_offset,
                    }),
                    None => batch.discarded += 1,
                }
                pos += newline + 1;
                batch.next_offset = end_offset;
            }
            Err(err) if is_first => {
                tracing::debug!(offset = start_offset, error = %err, "skipping partial leading line");
                batch.skipped_fragment = true;
                pos += newline + 1;
                batch.next_offset = end_offset;
            }
            Err(err) => {
                tracing::debug!(offset = start_offset, error = %err, "stopping before incomplete line");
                break;
            }
        }
    }

    batch
}
