// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `galois` module provides GF(2^8) arithmetic and the small Reed-Solomon decoders used by
//! the CIRC and sector ECC layers.
//!
//! The field is generated by x^8 + x^4 + x^3 + x^2 + 1 (0x11d). A codeword of `n` symbols with
//! `2t` check symbols has syndromes S_i = Σ_j w_j·α^(i·j) for i < 2t, all zero when intact.

/// Anti-log table: α^i for i in 0..510, doubled so products of logs index directly.
const GF_EXP: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut value: u16 = 1;
    let mut i = 0;
    while i < 255 {
        table[i] = value as u8;
        table[i + 255] = value as u8;
        value <<= 1;
        if value & 0x100 != 0 {
            value ^= 0x11d;
        }
        i += 1;
    }
    table[510] = table[255];
    table[511] = table[256];
    table
};

/// Log table: log_α(i) for i in 1..=255. Index 0 is unused.
const GF_LOG: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 255 {
        table[GF_EXP[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[inline]
pub fn gf_mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    GF_EXP[GF_LOG[a as usize] as usize + GF_LOG[b as usize] as usize]
}

#[inline]
pub fn gf_div(a: u8, b: u8) -> u8 {
    assert!(b != 0, "division by zero in GF(256)");
    if a == 0 {
        return 0;
    }
    GF_EXP[255 + GF_LOG[a as usize] as usize - GF_LOG[b as usize] as usize]
}

#[inline]
pub fn gf_inv(a: u8) -> u8 {
    gf_div(1, a)
}

/// α raised to a non-negative power.
#[inline]
pub fn alpha_pow(power: usize) -> u8 {
    GF_EXP[power % 255]
}

#[inline]
pub fn gf_log(a: u8) -> usize {
    assert!(a != 0, "log of zero in GF(256)");
    GF_LOG[a as usize] as usize
}

/// Compute the first `count` syndromes of `word`.
pub fn syndromes(word: &[u8], count: usize) -> Vec<u8> {
    let mut result = vec![0u8; count];

    for (i, syndrome) in result.iter_mut().enumerate() {
        let mut sum = 0u8;
        for (j, &symbol) in word.iter().enumerate() {
            sum ^= gf_mul(symbol, alpha_pow(i * j));
        }
        *syndrome = sum;
    }

    result
}

/// Outcome of a Reed-Solomon decode attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RsOutcome {
    /// All syndromes were zero.
    Clean,
    /// The word contained errors which were corrected in place.
    Corrected(usize),
    /// The word is beyond the correction capability of the code.
    Failed,
}

/// Correct up to two symbol errors in a codeword with four check symbols, in place.
///
/// This is the C1/C2-style decoder: the Peterson direct solution for t = 2, with the remaining
/// syndromes used to verify the correction before it is accepted.
pub fn correct_double(word: &mut [u8]) -> RsOutcome {
    let n = word.len();
    let s = syndromes(word, 4);

    if s.iter().all(|&syndrome| syndrome == 0) {
        return RsOutcome::Clean;
    }

    // Try a single error first: S_i form a geometric progression with ratio α^j.
    if s[0] != 0 && s[1] != 0 {
        let ratio = gf_div(s[1], s[0]);
        let position = gf_log(ratio);

        if position < n
            && s[2] == gf_mul(s[1], ratio)
            && s[3] == gf_mul(s[2], ratio)
        {
            word[position] ^= s[0];
            return RsOutcome::Corrected(1);
        }
    }

    // Two errors: solve for the error locator polynomial x^2 + σ1·x + σ2.
    let det = gf_mul(s[1], s[1]) ^ gf_mul(s[0], s[2]);
    if det == 0 {
        return RsOutcome::Failed;
    }

    let sigma1 = gf_div(gf_mul(s[1], s[2]) ^ gf_mul(s[0], s[3]), det);
    let sigma2 = gf_div(gf_mul(s[2], s[2]) ^ gf_mul(s[1], s[3]), det);

    // Chien search over the codeword positions.
    let mut roots = [0usize; 2];
    let mut num_roots = 0;

    for j in 0..n {
        let x = alpha_pow(j);
        let value = gf_mul(x, x) ^ gf_mul(sigma1, x) ^ sigma2;
        if value == 0 {
            if num_roots == 2 {
                return RsOutcome::Failed;
            }
            roots[num_roots] = j;
            num_roots += 1;
        }
    }

    if num_roots != 2 {
        return RsOutcome::Failed;
    }

    let x1 = alpha_pow(roots[0]);
    let x2 = alpha_pow(roots[1]);

    // Solve Y1 + Y2 = S0, Y1·X1 + Y2·X2 = S1 for the error magnitudes.
    let y1 = gf_div(s[1] ^ gf_mul(s[0], x2), x1 ^ x2);
    let y2 = s[0] ^ y1;

    if y1 == 0 || y2 == 0 {
        return RsOutcome::Failed;
    }

    // Verify against the remaining syndromes before accepting.
    let x1_sq = gf_mul(x1, x1);
    let x2_sq = gf_mul(x2, x2);
    if s[2] != gf_mul(y1, x1_sq) ^ gf_mul(y2, x2_sq) {
        return RsOutcome::Failed;
    }
    if s[3] != gf_mul(y1, gf_mul(x1_sq, x1)) ^ gf_mul(y2, gf_mul(x2_sq, x2)) {
        return RsOutcome::Failed;
    }

    word[roots[0]] ^= y1;
    word[roots[1]] ^= y2;

    RsOutcome::Corrected(2)
}

/// Fill up to four erased symbols in a codeword with four check symbols, in place.
///
/// The erased positions must already be zeroed. The erasure magnitudes are found by solving the
/// syndrome equations directly; when fewer than four symbols are erased the spare syndromes must
/// agree with the solution, otherwise the word also contains errors and the fill is rejected.
pub fn correct_erasures(word: &mut [u8], erasures: &[usize]) -> RsOutcome {
    let n = word.len();
    let e = erasures.len();
    assert!(e <= 4, "at most four erasures are solvable with four check symbols");
    assert!(erasures.iter().all(|&p| p < n));

    let s = syndromes(word, 4);

    if s.iter().all(|&syndrome| syndrome == 0) {
        return RsOutcome::Clean;
    }
    if e == 0 {
        return RsOutcome::Failed;
    }

    // Build the e × (e+1) augmented system Σ_k Y_k·α^(i·p_k) = S_i for i < e.
    let mut matrix = [[0u8; 5]; 4];
    for i in 0..e {
        for (k, &position) in erasures.iter().enumerate() {
            matrix[i][k] = alpha_pow(i * position);
        }
        matrix[i][e] = s[i];
    }

    // Gaussian elimination over GF(256).
    for column in 0..e {
        // Find a pivot row.
        let pivot = match (column..e).find(|&row| matrix[row][column] != 0) {
            Some(pivot) => pivot,
            None => return RsOutcome::Failed,
        };
        matrix.swap(column, pivot);

        let inv = gf_inv(matrix[column][column]);
        for value in matrix[column][..=e].iter_mut() {
            *value = gf_mul(*value, inv);
        }

        for row in 0..e {
            if row == column || matrix[row][column] == 0 {
                continue;
            }
            let factor = matrix[row][column];
            for k in 0..=e {
                let scaled = gf_mul(matrix[column][k], factor);
                matrix[row][k] ^= scaled;
            }
        }
    }

    let mut magnitudes = [0u8; 4];
    for k in 0..e {
        magnitudes[k] = matrix[k][e];
    }

    // Check the solution against the spare syndromes.
    for i in e..4 {
        let mut sum = 0u8;
        for (k, &position) in erasures.iter().enumerate() {
            sum ^= gf_mul(magnitudes[k], alpha_pow(i * position));
        }
        if sum != s[i] {
            return RsOutcome::Failed;
        }
    }

    let mut corrected = 0;
    for (k, &position) in erasures.iter().enumerate() {
        if magnitudes[k] != 0 {
            word[position] ^= magnitudes[k];
            corrected += 1;
        }
    }

    RsOutcome::Corrected(corrected)
}

/// Correct a single symbol error in a codeword with two check symbols, in place.
///
/// Used by the sector ECC's product code, whose P and Q codewords carry two check symbols each.
pub fn correct_single(word: &mut [u8]) -> RsOutcome {
    let n = word.len();
    let s = syndromes(word, 2);

    if s[0] == 0 && s[1] == 0 {
        return RsOutcome::Clean;
    }
    if s[0] == 0 || s[1] == 0 {
        return RsOutcome::Failed;
    }

    let position = gf_log(gf_div(s[1], s[0]));
    if position >= n {
        return RsOutcome::Failed;
    }

    word[position] ^= s[0];
    RsOutcome::Corrected(1)
}

/// Compute check symbols so that `word` has zero syndromes, writing them at `check_positions`.
///
/// This is used to build valid codewords for the decoders above: filling the check positions is
/// the same linear problem as solving for erasures there.
pub fn fill_check_symbols(word: &mut [u8], check_positions: &[usize]) {
    for &position in check_positions {
        word[position] = 0;
    }

    let s = syndromes(word, check_positions.len());
    if s.iter().all(|&syndrome| syndrome == 0) {
        return;
    }

    let e = check_positions.len();
    assert!(e <= 4);

    let mut matrix = [[0u8; 5]; 4];
    for i in 0..e {
        for (k, &position) in check_positions.iter().enumerate() {
            matrix[i][k] = alpha_pow(i * position);
        }
        matrix[i][e] = s[i];
    }

    for column in 0..e {
        let pivot = (column..e).find(|&row| matrix[row][column] != 0).expect("singular system");
        matrix.swap(column, pivot);

        let inv = gf_inv(matrix[column][column]);
        for value in matrix[column][..=e].iter_mut() {
            *value = gf_mul(*value, inv);
        }

        for row in 0..e {
            if row == column || matrix[row][column] == 0 {
                continue;
            }
            let factor = matrix[row][column];
            for k in 0..=e {
                let scaled = gf_mul(matrix[column][k], factor);
                matrix[row][k] ^= scaled;
            }
        }
    }

    for (k, &position) in check_positions.iter().enumerate() {
        word[position] = matrix[k][e];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_codeword(n: usize, seed: u8) -> Vec<u8> {
        let mut word: Vec<u8> = (0..n).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
        let checks: Vec<usize> = (n - 4..n).collect();
        fill_check_symbols(&mut word, &checks);
        assert!(syndromes(&word, 4).iter().all(|&s| s == 0));
        word
    }

    #[test]
    fn verify_field_tables() {
        // α^255 = 1, and every non-zero element has an inverse.
        assert_eq!(alpha_pow(255), alpha_pow(0));
        assert_eq!(alpha_pow(0), 1);
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1);
        }
        assert_eq!(gf_mul(0x53, 0xca), gf_mul(0xca, 0x53));
    }

    #[test]
    fn verify_double_error_correction() {
        let clean = make_codeword(32, 7);

        // No errors.
        let mut word = clean.clone();
        assert_eq!(correct_double(&mut word), RsOutcome::Clean);

        // One error.
        let mut word = clean.clone();
        word[5] ^= 0x42;
        assert_eq!(correct_double(&mut word), RsOutcome::Corrected(1));
        assert_eq!(word, clean);

        // Two errors.
        let mut word = clean.clone();
        word[3] ^= 0x99;
        word[27] ^= 0x08;
        assert_eq!(correct_double(&mut word), RsOutcome::Corrected(2));
        assert_eq!(word, clean);

        // Three errors must not be "corrected" into a different codeword silently; the decoder
        // either fails or, rarely, miscorrects -- but it must never return Clean.
        let mut word = clean.clone();
        word[1] ^= 0x01;
        word[2] ^= 0x02;
        word[3] ^= 0x03;
        assert_ne!(correct_double(&mut word), RsOutcome::Clean);
    }

    #[test]
    fn verify_random_double_errors_are_corrected() {
        use rand::rngs::SmallRng;
        use rand::{Rng, SeedableRng};

        let clean = make_codeword(32, 42);
        let mut rng = SmallRng::seed_from_u64(0x0dd5);

        for _ in 0..200 {
            let mut word = clean.clone();

            let first = rng.random_range(0..32usize);
            let mut second = rng.random_range(0..32usize);
            while second == first {
                second = rng.random_range(0..32usize);
            }

            word[first] ^= rng.random_range(1..=255u8);
            word[second] ^= rng.random_range(1..=255u8);

            assert_eq!(correct_double(&mut word), RsOutcome::Corrected(2));
            assert_eq!(word, clean);
        }
    }

    #[test]
    fn verify_erasure_correction() {
        let clean = make_codeword(28, 99);

        // Four erasures, positions zeroed.
        let mut word = clean.clone();
        let erasures = [0usize, 9, 13, 27];
        for &p in &erasures {
            word[p] = 0;
        }
        match correct_erasures(&mut word, &erasures) {
            RsOutcome::Corrected(_) | RsOutcome::Clean => {}
            RsOutcome::Failed => panic!("four erasures not filled"),
        }
        assert_eq!(word, clean);

        // Two erasures plus an unflagged error elsewhere must be rejected.
        let mut word = clean.clone();
        word[4] = 0;
        word[5] = 0;
        word[20] ^= 0x77;
        assert_eq!(correct_erasures(&mut word, &[4, 5]), RsOutcome::Failed);
    }

    #[test]
    fn verify_single_error_correction() {
        let mut word: Vec<u8> = (0..26).map(|i| i as u8 ^ 0xa5).collect();
        let checks = [24usize, 25];
        // Two check symbols need only two syndromes; reuse the generic filler.
        for &p in &checks {
            word[p] = 0;
        }
        let s = syndromes(&word, 2);
        // Solve the 2x2 system by substitution for the test fixture.
        let a00 = alpha_pow(0 * 24);
        let a01 = alpha_pow(0 * 25);
        let a10 = alpha_pow(1 * 24);
        let a11 = alpha_pow(1 * 25);
        let det = gf_mul(a00, a11) ^ gf_mul(a01, a10);
        word[24] = gf_div(gf_mul(s[0], a11) ^ gf_mul(s[1], a01), det);
        word[25] = gf_div(gf_mul(s[1], a00) ^ gf_mul(s[0], a10), det);
        assert!(syndromes(&word, 2).iter().all(|&s| s == 0));

        let clean = word.clone();
        word[17] ^= 0x3c;
        assert_eq!(correct_single(&mut word), RsOutcome::Corrected(1));
        assert_eq!(word, clean);
    }
}
