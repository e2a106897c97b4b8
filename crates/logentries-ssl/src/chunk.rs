// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffered records, as handed from the host to the pipeline.
//!
//! Each record is appended as a MessagePack array `[tag, time, fields]`, so a
//! chunk is a compact byte buffer that can be replayed in order.

use crate::error::ChunkError;
use crate::record::Record;
use std::io::Cursor;

#[derive(Debug, Clone, Default)]
pub struct Chunk {
    buf: Vec<u8>,
    records: usize,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: &Record) -> Result<(), ChunkError> {
        rmp_serde::encode::write(&mut self.buf, record)?;
        self.records += 1;
        Ok(())
    }

    /// Number of records in the chunk.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Encoded size in bytes.
    pub fn bytesize(&self) -> usize {
        self.buf.len()
    }

    /// Records in the order they were appended.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            cursor: Cursor::new(&self.buf),
            failed: false,
        }
    }
}

pub struct Entries<'a> {
    cursor: Cursor<&'a Vec<u8>>,
    failed: bool,
}

impl Iterator for Entries<'_> {
    type Item = Result<Record, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor.position() as usize;
        if self.failed || offset >= self.cursor.get_ref().len() {
            return None;
        }
        match rmp_serde::from_read(&mut self.cursor) {
            Ok(record) => Some(Ok(record)),
            Err(source) => {
                // position is unknown after a bad entry
                self.failed = true;
                Some(Err(ChunkError::Decode { offset, source }))
            }
        }
    }
}
