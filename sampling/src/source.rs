use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};
use rand_core::RngCore;

const MAXF64: f64 = 9007199254740992.0;

/// Deterministic ChaCha8 stream used for key generation and synthetic data.
pub struct Source {
    source: ChaCha8Rng,
}

/// Returns a fresh 32-byte seed drawn from the thread-local OS-seeded generator.
pub fn new_seed() -> [u8; 32] {
    let mut seed: [u8; 32] = [0u8; 32];
    rand::rng().fill_bytes(&mut seed);
    seed
}

impl Source {
    pub fn new(seed: [u8; 32]) -> Source {
        Source {
            source: ChaCha8Rng::from_seed(seed),
        }
    }

    pub fn branch(&mut self) -> ([u8; 32], Self) {
        let seed: [u8; 32] = self.new_seed();
        (seed, Source::new(seed))
    }

    pub fn new_seed(&mut self) -> [u8; 32] {
        let mut seed: [u8; 32] = [0u8; 32];
        self.fill_bytes(&mut seed);
        seed
    }

    /// Uniform value in [0, max) by masked rejection sampling.
    #[inline(always)]
    pub fn next_u64n(&mut self, max: u64, mask: u64) -> u64 {
        let mut x: u64 = self.next_u64() & mask;
        while x >= max {
            x = self.next_u64() & mask;
        }
        x
    }

    #[inline(always)]
    pub fn next_f64(&mut self, min: f64, max: f64) -> f64 {
        min + ((self.next_u64() << 11 >> 11) as f64) / MAXF64 * (max - min)
    }

    #[inline(always)]
    pub fn next_i64(&mut self) -> i64 {
        self.next_u64() as i64
    }
}

impl RngCore for Source {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        self.source.next_u32()
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        self.source.next_u64()
    }

    #[inline(always)]
    fn fill_bytes(&mut self, bytes: &mut [u8]) {
        self.source.fill_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::Source;

    #[test]
    fn branch_is_deterministic() {
        let mut a: Source = Source::new([7u8; 32]);
        let mut b: Source = Source::new([7u8; 32]);
        let (seed_a, mut child_a) = a.branch();
        let (seed_b, mut child_b) = b.branch();
        assert_eq!(seed_a, seed_b);
        (0..16).for_each(|_| assert_eq!(child_a.next_i64(), child_b.next_i64()));
    }

    #[test]
    fn next_u64n_bounded() {
        let mut source: Source = Source::new([1u8; 32]);
        (0..1000).for_each(|_| {
            let x: u64 = source.next_u64n(100, 127);
            assert!(x < 100, "{} >= 100", x);
        });
    }

    #[test]
    fn next_f64_in_range() {
        let mut source: Source = Source::new([2u8; 32]);
        (0..1000).for_each(|_| {
            let x: f64 = source.next_f64(-3.0, 5.0);
            assert!((-3.0..5.0).contains(&x), "{} out of range", x);
        });
    }
}
