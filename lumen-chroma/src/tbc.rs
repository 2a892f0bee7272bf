// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `tbc` module reads fields from a time-base-corrected capture file: 16-bit little-endian
//! composite samples, one field after another.

use std::io::{Read, Seek, SeekFrom};

use lumen_core::errors::Result;
use lumen_core::meta::FieldSource;

/// A seekable TBC capture file.
pub struct TbcFieldSource<R: Read + Seek> {
    reader: R,
    field_length: usize,
    read_buffer: Vec<u8>,
}

impl<R: Read + Seek> TbcFieldSource<R> {
    pub fn new(reader: R, field_length: usize) -> TbcFieldSource<R> {
        TbcFieldSource { reader, field_length, read_buffer: vec![0u8; field_length * 2] }
    }
}

impl<R: Read + Seek> FieldSource for TbcFieldSource<R> {
    fn field_length(&self) -> usize {
        self.field_length
    }

    fn read_field(&mut self, field_number: i32, data: &mut Vec<u16>) -> Result<()> {
        let offset = (field_number as u64 - 1) * (self.field_length as u64) * 2;
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut self.read_buffer)?;

        data.clear();
        data.extend(
            self.read_buffer.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn verify_field_reads() {
        // Two fields of four samples each, little endian.
        let samples: Vec<u16> = vec![1, 2, 3, 4, 100, 200, 300, 400];
        let mut bytes = Vec::new();
        for sample in &samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }

        let mut source = TbcFieldSource::new(Cursor::new(bytes), 4);

        let mut data = Vec::new();
        source.read_field(2, &mut data).unwrap();
        assert_eq!(data, vec![100, 200, 300, 400]);

        source.read_field(1, &mut data).unwrap();
        assert_eq!(data, vec![1, 2, 3, 4]);

        // Reading past the end is an error.
        assert!(source.read_field(3, &mut data).is_err());
    }
}
