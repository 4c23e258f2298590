//! Flip/rotation variants of a 64-bit average-intensity hash.
//!
//! The hash is an 8x8 grid of bits, bit `row * 8 + col`.

use tagsieve_core::config::SimilarMode;

const SIDE: usize = 8;
const MAX: usize = SIDE - 1;

/// The eight symmetries of the square, as `(row, col) -> (row, col)` maps.
const TRANSFORMS: [fn(usize, usize) -> (usize, usize); 8] = [
    |r, c| (r, c),
    |r, c| (c, MAX - r),
    |r, c| (MAX - r, MAX - c),
    |r, c| (MAX - c, r),
    |r, c| (r, MAX - c),
    |r, c| (MAX - r, c),
    |r, c| (c, r),
    |r, c| (MAX - c, MAX - r),
];

pub fn parse_hash(value: &str) -> Result<u64, String> {
    let v = value.trim();
    let digits = v
        .strip_prefix("0x")
        .or_else(|| v.strip_prefix("0X"))
        .unwrap_or(v);
    u64::from_str_radix(digits, 16).map_err(|e| format!("`{value}` is not a 64-bit hex hash: {e}"))
}

fn remap(hash: u64, transform: fn(usize, usize) -> (usize, usize)) -> u64 {
    let mut out = 0u64;
    for r in 0..SIDE {
        for c in 0..SIDE {
            if (hash >> (r * SIDE + c)) & 1 == 1 {
                let (nr, nc) = transform(r, c);
                out |= 1 << (nr * SIDE + nc);
            }
        }
    }
    out
}

/// Distinct variants in a fixed order, the hash itself first.
pub fn variants(hash: u64, mode: SimilarMode) -> Vec<u64> {
    match mode {
        SimilarMode::Identity => vec![hash],
        SimilarMode::All => {
            let mut out: Vec<u64> = Vec::with_capacity(TRANSFORMS.len());
            for t in TRANSFORMS {
                let v = remap(hash, t);
                if !out.contains(&v) {
                    out.push(v);
                }
            }
            out
        }
    }
}
