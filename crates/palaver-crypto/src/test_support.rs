use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Random source whose entropy is never available.
pub(crate) struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("entropy source unavailable");
    }

    fn next_u64(&mut self) -> u64 {
        panic!("entropy source unavailable");
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("entropy source unavailable");
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
        Err(rand::Error::new("entropy source unavailable"))
    }
}

impl CryptoRng for FailingRng {}

/// Delegates to `OsRng` for `remaining` fills, then fails.
pub(crate) struct ExhaustingRng {
    pub remaining: usize,
}

impl RngCore for ExhaustingRng {
    fn next_u32(&mut self) -> u32 {
        OsRng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        OsRng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.try_fill_bytes(dest) {
            panic!("{e}");
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        if self.remaining == 0 {
            return Err(rand::Error::new("entropy source exhausted"));
        }
        self.remaining -= 1;
        OsRng.try_fill_bytes(dest)
    }
}

impl CryptoRng for ExhaustingRng {}
