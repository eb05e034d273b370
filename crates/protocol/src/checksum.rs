//! Adler-32 checksum used in the transport header

const ADLER_MOD: u32 = 65521;
/// Largest block that can be summed before the accumulators must be reduced.
const ADLER_NMAX: usize = 5552;

/// Compute the Adler-32 checksum of `data`
pub fn adler32(data: &[u8]) -> u32 {
    let mut a: u32 = 1;
    let mut b: u32 = 0;

    for chunk in data.chunks(ADLER_NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= ADLER_MOD;
        b %= ADLER_MOD;
    }

    (b << 16) | a
}
