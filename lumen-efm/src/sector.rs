// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `sector` module decodes data sectors from F1 frames.
//!
//! A sector is 2352 bytes (one section of 98 F1 frames): a 12-byte sync pattern, a 4-byte
//! header (BCD address plus mode), and a mode-dependent payload. Mode 1 sectors carry 2048 user
//! bytes protected by a 32-bit EDC and a Reed-Solomon product code over two byte planes; modes 0
//! and 2 carry 2336 unchecked bytes. Everything after the sync pattern is scrambled on disc.

use log::{debug, info};

use lumen_core::checksum::Crc32Edc;

use crate::f1frame::F1Frame;
use crate::galois::{correct_single, RsOutcome};
use crate::time::TrackTime;

/// Raw sector size in bytes.
pub const SECTOR_SIZE: usize = 2352;

/// F1 frames per sector (one section).
const FRAMES_PER_SECTOR: usize = 98;

/// The sector sync pattern: 00 followed by ten FFs and another 00.
const SYNC_PATTERN: [u8; 12] =
    [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00];

/// The scrambler sequence for bytes 12..2352, from the x^15 + x + 1 shift register.
const SCRAMBLE_TABLE: [u8; SECTOR_SIZE - 12] = {
    let mut table = [0u8; SECTOR_SIZE - 12];
    let mut register: u16 = 0x0001;

    let mut i = 0;
    while i < table.len() {
        let mut byte = 0u8;
        let mut bit = 0;
        while bit < 8 {
            byte |= ((register & 1) as u8) << bit;
            let feedback = (register & 1) ^ ((register >> 1) & 1);
            register = (register >> 1) | (feedback << 14);
            bit += 1;
        }
        table[i] = byte;
        i += 1;
    }

    table
};

/// Remove (or apply; it is an involution) the scrambling on bytes 12..2352.
pub fn unscramble(sector: &mut [u8; SECTOR_SIZE]) {
    for (byte, scramble) in sector[12..].iter_mut().zip(SCRAMBLE_TABLE.iter()) {
        *byte ^= scramble;
    }
}

/// Positions of the P codeword `column` (0..43) in byte plane `plane`: 24 data symbols down the
/// column plus two check symbols.
fn p_codeword_positions(plane: usize, column: usize) -> [usize; 26] {
    let mut positions = [0usize; 26];
    for row in 0..24 {
        positions[row] = 12 + 2 * (43 * row + column) + plane;
    }
    positions[24] = 2076 + 2 * column + plane;
    positions[25] = 2076 + 2 * (43 + column) + plane;
    positions
}

/// Positions of the Q codeword `diagonal` (0..26) in byte plane `plane`: 43 data symbols along
/// a diagonal of the P-protected region plus two check symbols.
fn q_codeword_positions(plane: usize, diagonal: usize) -> [usize; 45] {
    let mut positions = [0usize; 45];
    for step in 0..43 {
        positions[step] = 12 + 2 * ((44 * diagonal + 43 * step) % 1118) + plane;
    }
    positions[43] = 2248 + 2 * diagonal + plane;
    positions[44] = 2248 + 2 * (26 + diagonal) + plane;
    positions
}

/// Run one pass of the product code over the sector, correcting single errors per codeword.
/// Returns the number of corrections applied.
fn rspc_pass(sector: &mut [u8; SECTOR_SIZE]) -> usize {
    let mut corrections = 0;

    for plane in 0..2 {
        for column in 0..43 {
            let positions = p_codeword_positions(plane, column);
            let mut word: Vec<u8> = positions.iter().map(|&p| sector[p]).collect();
            if let RsOutcome::Corrected(_) = correct_single(&mut word) {
                for (&position, &value) in positions.iter().zip(word.iter()) {
                    sector[position] = value;
                }
                corrections += 1;
            }
        }

        for diagonal in 0..26 {
            let positions = q_codeword_positions(plane, diagonal);
            let mut word: Vec<u8> = positions.iter().map(|&p| sector[p]).collect();
            if let RsOutcome::Corrected(_) = correct_single(&mut word) {
                for (&position, &value) in positions.iter().zip(word.iter()) {
                    sector[position] = value;
                }
                corrections += 1;
            }
        }
    }

    corrections
}

/// Compute the EDC over the sync, header and data area of a mode 1 sector.
fn mode1_edc(sector: &[u8; SECTOR_SIZE]) -> u32 {
    let mut edc = Crc32Edc::new();
    edc.process_buf_bytes(&sector[..2064]);
    edc.crc()
}

fn stored_edc(sector: &[u8; SECTOR_SIZE]) -> u32 {
    u32::from_le_bytes([sector[2064], sector[2065], sector[2066], sector[2067]])
}

/// One decoded data sector.
#[derive(Clone, Debug)]
pub struct Sector {
    mode: i32,
    address: TrackTime,
    user_data: Vec<u8>,
    is_valid: bool,
    is_corrected: bool,
}

impl Sector {
    /// Decode a raw 2352-byte sector.
    pub fn decode(raw: &[u8; SECTOR_SIZE]) -> Sector {
        let mut sector = *raw;

        // The sync pattern is not scrambled; tolerate a few damaged bytes of it.
        let sync_errors =
            sector[..12].iter().zip(SYNC_PATTERN.iter()).filter(|(a, b)| a != b).count();

        unscramble(&mut sector);

        let address = TrackTime::from_bcd(sector[12], sector[13], sector[14]);
        let mode = i32::from(sector[15]);

        let header_valid = sync_errors <= 2 && address.is_some() && mode <= 2;
        let address = address.unwrap_or_default();

        match mode {
            1 if header_valid => {
                let mut is_corrected = false;
                let mut is_valid = mode1_edc(&sector) == stored_edc(&sector);

                if !is_valid {
                    // Let the product code repair what it can, then re-check.
                    let mut corrections = 0;
                    for _ in 0..2 {
                        let pass = rspc_pass(&mut sector);
                        corrections += pass;
                        if pass == 0 {
                            break;
                        }
                    }

                    if corrections > 0 && mode1_edc(&sector) == stored_edc(&sector) {
                        is_valid = true;
                        is_corrected = true;
                    }
                }

                Sector {
                    mode,
                    address,
                    user_data: sector[16..2064].to_vec(),
                    is_valid,
                    is_corrected,
                }
            }
            0 | 2 if header_valid => {
                // Modes 0 and 2 have no checked structure here; pass the payload through.
                Sector {
                    mode,
                    address,
                    user_data: sector[16..].to_vec(),
                    is_valid: true,
                    is_corrected: false,
                }
            }
            _ => Sector {
                mode,
                address,
                user_data: Vec::new(),
                is_valid: false,
                is_corrected: false,
            },
        }
    }

    pub fn mode(&self) -> i32 {
        self.mode
    }

    pub fn address(&self) -> TrackTime {
        self.address
    }

    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn is_corrected(&self) -> bool {
        self.is_corrected
    }

    /// Size of the zero padding written in place of a missing sector of this mode.
    pub fn padding_size(&self) -> usize {
        match self.mode {
            1 => 2048,
            _ => 2336,
        }
    }
}

/// Statistics for the sector stage.
#[derive(Clone, Copy, Debug, Default)]
pub struct Statistics {
    pub valid_sectors: u64,
    pub invalid_sectors: u64,
    pub corrected_sectors: u64,

    pub sectors_written: u64,
    pub gap_sectors: u64,
    pub missing_sectors: u64,
}

/// F1 frame to data converter: assembles sectors, validates them, and emits their payloads in
/// address order with zero padding over gaps.
pub struct F1ToData {
    buffer: Vec<F1Frame>,
    got_first_valid_sector: bool,
    last_good_address: TrackTime,
    statistics: Statistics,
}

impl F1ToData {
    pub fn new() -> F1ToData {
        F1ToData {
            buffer: Vec::new(),
            got_first_valid_sector: false,
            last_good_address: TrackTime::default(),
            statistics: Statistics::default(),
        }
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.got_first_valid_sector = false;
        self.last_good_address = TrackTime::default();
        self.statistics = Statistics::default();
    }

    /// Feed F1 frames in, returning the user data bytes completed by them.
    pub fn process(&mut self, f1_frames: &[F1Frame]) -> Vec<u8> {
        self.buffer.extend_from_slice(f1_frames);

        let mut data = Vec::new();

        while self.buffer.len() >= FRAMES_PER_SECTOR {
            let mut raw = [0u8; SECTOR_SIZE];
            for (chunk, frame) in
                raw.chunks_exact_mut(24).zip(self.buffer.drain(..FRAMES_PER_SECTOR))
            {
                chunk.copy_from_slice(&frame.data);
            }

            let sector = Sector::decode(&raw);

            if sector.is_valid() {
                self.statistics.valid_sectors += 1;
                if sector.is_corrected() {
                    self.statistics.corrected_sectors += 1;
                }
                self.write_sector(&sector, &mut data);
            } else {
                self.statistics.invalid_sectors += 1;
                debug!(
                    "invalid mode {} sector at {} ignored",
                    sector.mode(),
                    sector.address()
                );
            }
        }

        data
    }

    /// Emit one valid sector, zero-padding any address gap since the previous one.
    fn write_sector(&mut self, sector: &Sector, data: &mut Vec<u8>) {
        if self.got_first_valid_sector {
            let mut expected = self.last_good_address;
            expected.add_frames(1);

            let missing = sector.address().difference(expected);
            if missing > 0 {
                // A long run of missing sectors is probably a break in the EFM signal on the
                // disc; a short one is probably corrupt data.
                if missing > 16 {
                    debug!("gap of {missing} sectors (probably a break in the EFM signal)");
                    self.statistics.gap_sectors += missing as u64;
                } else {
                    debug!("gap of {missing} sectors (probably corrupt data)");
                    self.statistics.missing_sectors += missing as u64;
                }

                let padding = vec![0u8; sector.padding_size()];
                for _ in 0..missing {
                    data.extend_from_slice(&padding);
                }
                self.statistics.sectors_written += missing as u64;
            }
        } else {
            self.got_first_valid_sector = true;
            debug!("first valid data sector found at {}", sector.address());
        }

        data.extend_from_slice(sector.user_data());
        self.last_good_address = sector.address();
        self.statistics.sectors_written += 1;
    }

    /// Log the stage statistics.
    pub fn report(&self) {
        let s = &self.statistics;
        info!("F1 frames to data:");
        info!(
            "  valid sectors: {} (of which {} ECC corrected)",
            s.valid_sectors, s.corrected_sectors
        );
        info!("  unrecoverable sectors: {}", s.invalid_sectors);
        info!(
            "  sectors written: {} ({} signal-gap, {} data-loss padding)",
            s.sectors_written, s.gap_sectors, s.missing_sectors
        );
    }
}

impl Default for F1ToData {
    fn default() -> Self {
        F1ToData::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::encode_sector;

    fn frames_from_sector(raw: &[u8; SECTOR_SIZE], address: TrackTime) -> Vec<F1Frame> {
        raw.chunks_exact(24)
            .map(|chunk| {
                let mut frame = F1Frame { disc_time: address, ..F1Frame::default() };
                frame.data.copy_from_slice(chunk);
                frame
            })
            .collect()
    }

    #[test]
    fn verify_scramble_sequence() {
        // The first bytes of the x^15 + x + 1 scrambler sequence.
        assert_eq!(&SCRAMBLE_TABLE[..8], &[0x01, 0x80, 0x00, 0x60, 0x00, 0x28, 0x00, 0x1e]);

        // Unscrambling twice is the identity.
        let mut sector = [0x42u8; SECTOR_SIZE];
        unscramble(&mut sector);
        unscramble(&mut sector);
        assert!(sector.iter().all(|&byte| byte == 0x42));
    }

    #[test]
    fn verify_clean_sector_decodes() {
        let user_data: Vec<u8> = (0..2048u32).map(|i| (i * 3) as u8).collect();
        let raw = encode_sector(TrackTime::new(0, 2, 10), &user_data);

        let sector = Sector::decode(&raw);

        assert!(sector.is_valid());
        assert!(!sector.is_corrected());
        assert_eq!(sector.mode(), 1);
        assert_eq!(sector.address(), TrackTime::new(0, 2, 10));
        assert_eq!(sector.user_data(), &user_data[..]);
    }

    #[test]
    fn verify_damaged_sector_is_ecc_corrected() {
        let user_data: Vec<u8> = (0..2048u32).map(|i| (i >> 3) as u8).collect();
        let mut raw = encode_sector(TrackTime::new(0, 2, 11), &user_data);

        // Flip one data byte post-scrambling.
        raw[100] ^= 0x40;

        let sector = Sector::decode(&raw);

        assert!(sector.is_valid());
        assert!(sector.is_corrected());
        assert_eq!(sector.user_data(), &user_data[..]);
    }

    #[test]
    fn verify_hopeless_sector_is_invalid() {
        let user_data = vec![0u8; 2048];
        let mut raw = encode_sector(TrackTime::new(0, 2, 12), &user_data);

        // Trash a large stretch of the data area.
        for byte in raw[200..800].iter_mut() {
            *byte = 0xa7;
        }

        let sector = Sector::decode(&raw);
        assert!(!sector.is_valid());
    }

    #[test]
    fn verify_address_gap_is_padded() {
        let user_a: Vec<u8> = vec![0x11; 2048];
        let user_b: Vec<u8> = vec![0x22; 2048];

        let sector_a = encode_sector(TrackTime::new(0, 3, 0), &user_a);
        // Three addresses ahead: two sectors missing.
        let sector_b = encode_sector(TrackTime::new(0, 3, 3), &user_b);

        let mut converter = F1ToData::new();
        let mut data = Vec::new();
        data.extend(converter.process(&frames_from_sector(&sector_a, TrackTime::new(0, 3, 0))));
        data.extend(converter.process(&frames_from_sector(&sector_b, TrackTime::new(0, 3, 3))));

        assert_eq!(data.len(), 4 * 2048);
        assert!(data[..2048].iter().all(|&byte| byte == 0x11));
        assert!(data[2048..3 * 2048].iter().all(|&byte| byte == 0));
        assert!(data[3 * 2048..].iter().all(|&byte| byte == 0x22));

        assert_eq!(converter.statistics().missing_sectors, 2);
        assert_eq!(converter.statistics().sectors_written, 4);
    }
}
