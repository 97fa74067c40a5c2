//! Short public codes printed on physical review cards.

use rand::Rng;

// Lowercase base32 without lookalike characters (0/o, 1/l/i).
const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";

pub const SLUG_LEN: usize = 8;

pub fn generate(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length_and_charset() {
        let slug = generate(SLUG_LEN);
        assert_eq!(slug.len(), SLUG_LEN);
        assert!(slug.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn test_generate_varies() {
        let a = generate(SLUG_LEN);
        let b = generate(SLUG_LEN);
        // 31^8 possibilities, a collision here means the rng is broken.
        assert_ne!(a, b);
    }
}
