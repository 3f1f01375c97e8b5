//! Payload masking (RFC 6455 Section 5.3) and mask key generation.

/// XOR `data` with the repeating 4-byte `mask`.
///
/// Masking is its own inverse. `data` must start at payload offset 0.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    let word = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(chunk);
        chunk.copy_from_slice(&(u32::from_ne_bytes(bytes) ^ word).to_ne_bytes());
    }
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}

/// Keys drawn from the OS per refill.
const KEYS_PER_REFILL: usize = 64;

/// Source of per-frame mask keys.
///
/// Keys come from the operating system's CSPRNG in batches. If the OS source
/// fails the generator falls back to a mixed counter so sending never stalls.
#[derive(Debug)]
pub struct MaskGenerator {
    pool: [u8; KEYS_PER_REFILL * 4],
    next: usize,
    counter: u32,
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskGenerator {
    #[must_use]
    pub fn new() -> Self {
        let mut seed = [0u8; 4];
        let counter = match getrandom::getrandom(&mut seed) {
            Ok(()) => u32::from_le_bytes(seed),
            Err(_) => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.subsec_nanos())
                .unwrap_or(0x1234_5678),
        };
        Self {
            pool: [0; KEYS_PER_REFILL * 4],
            next: KEYS_PER_REFILL,
            counter,
        }
    }

    /// Next mask key.
    pub fn next_key(&mut self) -> [u8; 4] {
        if self.next == KEYS_PER_REFILL {
            if getrandom::getrandom(&mut self.pool).is_err() {
                return self.mixed();
            }
            self.next = 0;
        }
        let at = self.next * 4;
        self.next += 1;
        [
            self.pool[at],
            self.pool[at + 1],
            self.pool[at + 2],
            self.pool[at + 3],
        ]
    }

    fn mixed(&mut self) -> [u8; 4] {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let mut x = self.counter.wrapping_mul(0x85EB_CA6B);
        x ^= x >> 13;
        x = x.wrapping_mul(0xC2B2_AE35);
        x.to_le_bytes()
    }
}
