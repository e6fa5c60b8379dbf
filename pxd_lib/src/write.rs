//! Utilities for laying out payload data with relocatable pointers.
use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::{BinResult, BinWrite};

/// Round `x` up to the next multiple of `n`.
pub fn round_up(x: u64, n: u64) -> u64 {
    x.div_ceil(n) * n
}

/// A pointer field waiting for the position of its data.
///
/// Pointers that are never set stay null and are not relocated.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Offset {
    /// The position in the payload for the pointer field.
    pub position: u64,
}

impl Offset {
    /// Point this field at the current end of the payload.
    pub fn set_here(self, writer: &mut PayloadWriter) -> BinResult<u64> {
        let target = writer.position();
        self.set(writer, target)?;
        Ok(target)
    }

    /// Point this field at `target` and record it for the offset table.
    pub fn set(self, writer: &mut PayloadWriter, target: u64) -> BinResult<()> {
        let end = writer.position();
        writer.cursor.seek(SeekFrom::Start(self.position))?;
        target.write_le(&mut writer.cursor)?;
        writer.cursor.seek(SeekFrom::Start(end))?;

        writer.pointers.push(self.position);
        Ok(())
    }
}

/// Writes a payload sequentially while tracking the position of every pointer.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    cursor: Cursor<Vec<u8>>,
    pointers: Vec<u64>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current end of the payload.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn write<T>(&mut self, value: &T) -> BinResult<()>
    where
        for<'a> T: BinWrite<Args<'a> = ()>,
    {
        value.write_le(&mut self.cursor)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> BinResult<()> {
        self.cursor.write_all(bytes)?;
        Ok(())
    }

    /// Write a null 8 byte pointer to be set later.
    pub fn offset_placeholder(&mut self) -> BinResult<Offset> {
        let position = self.position();
        0u64.write_le(&mut self.cursor)?;
        Ok(Offset { position })
    }

    /// Pad with zeros to a multiple of `alignment` bytes.
    pub fn pad_to(&mut self, alignment: u64) -> BinResult<()> {
        let position = self.position();
        let aligned = round_up(position, alignment);
        self.cursor
            .write_all(&vec![0u8; (aligned - position) as usize])?;
        Ok(())
    }

    /// Return the payload bytes and the ascending position of each pointer.
    pub fn finish(self) -> (Vec<u8>, Vec<u64>) {
        let mut pointers = self.pointers;
        pointers.sort_unstable();
        (self.cursor.into_inner(), pointers)
    }
}
