// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `section` module decodes the subcode of one section: 98 subcode symbols split bit-wise
//! into channels P..W, with the Q channel's CRC-checked metadata interpreted.

use log::debug;

use lumen_core::checksum::Crc16Ccitt;

use crate::time::{bcd_to_integer, TrackTime};

/// Number of subcode symbols (and frames) in one section. The first two symbols carry the
/// section sync patterns, leaving 96 payload bits per channel.
pub const FRAMES_PER_SECTION: usize = 98;

/// The Q channel control flags.
#[derive(Clone, Copy, Debug, Default)]
pub struct QControl {
    pub is_stereo_not_quad: bool,
    pub is_audio_not_data: bool,
    pub is_copy_protected: bool,
    pub has_preemphasis: bool,
}

/// The Q channel mode 1 (CD) and mode 4 (LaserDisc) payload, which share a layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct QMode1And4 {
    pub is_lead_in: bool,
    pub is_lead_out: bool,
    pub track_number: i32,
    /// Index within the track; -1 in the lead-in.
    pub x: i32,
    /// Lead-in table-of-contents point; -1 outside the lead-in.
    pub point: i32,
    pub track_time: TrackTime,
    pub disc_time: TrackTime,
    pub is_encoder_running: bool,
}

/// The Q channel mode 2 payload: the disc catalogue number.
#[derive(Clone, Debug, Default)]
pub struct QMode2 {
    pub catalogue_number: String,
    pub a_frame: i32,
}

#[derive(Clone, Debug, Default)]
pub struct QMetadata {
    pub control: QControl,
    pub mode1_and_4: QMode1And4,
    pub mode2: QMode2,
}

/// One decoded section.
#[derive(Clone, Debug)]
pub struct Section {
    /// The Q mode (0-4), or -1 when the Q channel failed its CRC.
    q_mode: i32,
    q_metadata: QMetadata,
    channels: [[u8; 12]; 8],
}

impl Section {
    /// Decode a section from its 98 subcode symbols.
    ///
    /// Returns `None` when the Q channel CRC does not validate; the section's timing cannot be
    /// trusted in that case.
    pub fn decode(subcode: &[u8; FRAMES_PER_SECTION]) -> Option<Section> {
        // Split the subcode symbols bit-wise into the eight channels. Symbols 0 and 1 carry the
        // section sync patterns, so the payload starts at symbol 2.
        let mut channels = [[0u8; 12]; 8];

        let mut symbol_number = 2;
        for byte in 0..12 {
            for bit in (0..8).rev() {
                let symbol = subcode[symbol_number];

                for channel in 0..8 {
                    if symbol & (0x80 >> channel) != 0 {
                        channels[channel][byte] |= 1 << bit;
                    }
                }
                symbol_number += 1;
            }
        }

        let q = &channels[1];

        // CRC check the Q channel: control + mode + data is 80 bits followed by a 16-bit CRC
        // stored inverted on the disc.
        let stored_crc = !((u16::from(q[10]) << 8) | u16::from(q[11]));

        let mut crc = Crc16Ccitt::new(0);
        crc.process_buf_bytes(&q[..10]);

        if crc.crc() != stored_crc {
            return None;
        }

        let mut section = Section { q_mode: -1, q_metadata: QMetadata::default(), channels };

        section.q_mode = section.decode_q_address();
        section.decode_q_control();

        match section.q_mode {
            1 | 4 => section.decode_q_mode_1_and_4(),
            2 => section.decode_q_mode_2(),
            0 | 3 => debug!("unsupported Q mode {}", section.q_mode),
            _ => debug!("invalid Q mode"),
        }

        Some(section)
    }

    pub fn q_mode(&self) -> i32 {
        self.q_mode
    }

    pub fn q_metadata(&self) -> &QMetadata {
        &self.q_metadata
    }

    /// Raw payload of one subcode channel (0 = P .. 7 = W).
    pub fn channel(&self, channel: usize) -> &[u8; 12] {
        &self.channels[channel]
    }

    fn q(&self) -> &[u8; 12] {
        &self.channels[1]
    }

    fn decode_q_address(&self) -> i32 {
        let q_mode = i32::from(self.q()[0] & 0x0f);

        if q_mode > 4 {
            -1
        } else {
            q_mode
        }
    }

    fn decode_q_control(&mut self) {
        let control_field = (self.q()[0] & 0xf0) >> 4;

        // Control field bits: x000 = 2/4 channel, 0x00 = audio/data, 00x0 = copy permitted,
        // 000x = pre-emphasis.
        self.q_metadata.control.is_stereo_not_quad = control_field & 0x08 == 0;
        self.q_metadata.control.is_audio_not_data = control_field & 0x04 == 0;
        self.q_metadata.control.is_copy_protected = control_field & 0x02 == 0;
        self.q_metadata.control.has_preemphasis = control_field & 0x01 != 0;
    }

    fn decode_q_mode_1_and_4(&mut self) {
        let q = *self.q();
        let meta = &mut self.q_metadata.mode1_and_4;

        let tno = bcd_to_integer(q[1]).unwrap_or(-1);

        let track_time = TrackTime::from_bcd(q[3], q[4], q[5]).unwrap_or_default();
        let disc_time = TrackTime::from_bcd(q[7], q[8], q[9]).unwrap_or_default();

        if q[1] == 0xaa {
            // Lead-out area.
            meta.is_lead_out = true;
            meta.is_lead_in = false;
            meta.track_number = tno;
            meta.x = bcd_to_integer(q[2]).unwrap_or(0);
            meta.point = -1;
        } else if tno == 0 {
            // Lead-in area.
            meta.is_lead_out = false;
            meta.is_lead_in = true;
            meta.track_number = tno;
            meta.x = -1;
            meta.point = bcd_to_integer(q[2]).unwrap_or(-1);
        } else {
            // Programme area.
            meta.is_lead_out = false;
            meta.is_lead_in = false;
            meta.track_number = tno;
            meta.x = bcd_to_integer(q[2]).unwrap_or(0);
            meta.point = -1;
        }

        meta.track_time = track_time;
        meta.disc_time = disc_time;

        // The encoder is paused in the lead-in, and in the programme/lead-out whenever the
        // index is zero.
        meta.is_encoder_running = !meta.is_lead_in && meta.x != 0;
    }

    fn decode_q_mode_2(&mut self) {
        let q = *self.q();
        let meta = &mut self.q_metadata.mode2;

        // 13 catalogue digits packed as BCD pairs; the 14th digit is always zero.
        let mut number = String::with_capacity(14);
        for byte in 1..=7 {
            number.push_str(&format!("{:02}", bcd_to_integer(q[byte]).unwrap_or(0)));
        }
        number.truncate(13);

        meta.catalogue_number = number;
        meta.a_frame = bcd_to_integer(q[9]).unwrap_or(0);
    }
}

/// Compute the Q channel CRC over a 10-byte payload, in the inverted form stored on disc.
pub fn q_channel_crc(payload: &[u8]) -> u16 {
    let mut crc = Crc16Ccitt::new(0);
    crc.process_buf_bytes(payload);
    !crc.crc()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pack 12 Q channel bytes into 98 subcode symbols (Q is bit 6 of each symbol).
    fn subcode_from_q(q: &[u8; 12]) -> [u8; FRAMES_PER_SECTION] {
        let mut subcode = [0u8; FRAMES_PER_SECTION];

        let mut symbol_number = 2;
        for byte in 0..12 {
            for bit in (0..8).rev() {
                if q[byte] & (1 << bit) != 0 {
                    subcode[symbol_number] |= 0x40;
                }
                symbol_number += 1;
            }
        }

        subcode
    }

    #[test]
    fn verify_q_mode_1_decodes() {
        let mut q = [0x41u8, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0, 0];
        let crc = q_channel_crc(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xff) as u8;

        let section = Section::decode(&subcode_from_q(&q)).expect("valid CRC rejected");

        assert_eq!(section.q_mode(), 1);
        let meta = &section.q_metadata().mode1_and_4;
        assert_eq!(meta.track_number, 1);
        assert_eq!(meta.disc_time, TrackTime::new(0, 0, 0));
        assert!(meta.is_encoder_running);
        assert!(!meta.is_lead_in && !meta.is_lead_out);
        // Control nibble 4 marks a data track.
        assert!(!section.q_metadata().control.is_audio_not_data);
    }

    #[test]
    fn verify_bad_crc_is_rejected() {
        let mut q = [0x41u8, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0, 0];
        let crc = q_channel_crc(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xff) as u8 ^ 0x01;

        assert!(Section::decode(&subcode_from_q(&q)).is_none());
    }

    #[test]
    fn verify_lead_in_and_lead_out() {
        // Lead-in: TNO 0.
        let mut q = [0x01u8, 0x00, 0x05, 0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0x00, 0, 0];
        let crc = q_channel_crc(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xff) as u8;

        let section = Section::decode(&subcode_from_q(&q)).unwrap();
        let meta = &section.q_metadata().mode1_and_4;
        assert!(meta.is_lead_in);
        assert_eq!(meta.point, 5);
        assert!(!meta.is_encoder_running);

        // Lead-out: TNO 0xAA, index 1 means the encoder is running.
        let mut q = [0x01u8, 0xaa, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0, 0];
        let crc = q_channel_crc(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xff) as u8;

        let section = Section::decode(&subcode_from_q(&q)).unwrap();
        let meta = &section.q_metadata().mode1_and_4;
        assert!(meta.is_lead_out);
        assert!(meta.is_encoder_running);
    }

    #[test]
    fn verify_channel_extraction() {
        // Set the P channel (bit 7) of every payload symbol: channel P becomes all ones.
        let mut subcode = [0x80u8; FRAMES_PER_SECTION];
        // Add a valid all-zero Q payload so decode succeeds.
        let mut q = [0u8; 12];
        let crc = q_channel_crc(&q[..10]);
        q[10] = (crc >> 8) as u8;
        q[11] = (crc & 0xff) as u8;

        let q_symbols = subcode_from_q(&q);
        for (symbol, q_symbol) in subcode.iter_mut().zip(q_symbols.iter()) {
            *symbol |= q_symbol;
        }

        let section = Section::decode(&subcode).unwrap();
        assert!(section.channel(0).iter().all(|&byte| byte == 0xff));
        // Channels R..W were never set.
        assert!(section.channel(2).iter().all(|&byte| byte == 0));
    }
}
