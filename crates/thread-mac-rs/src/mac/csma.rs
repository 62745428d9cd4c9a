// crates/thread-mac-rs/src/mac/csma.rs
//! Unslotted CSMA/CA backoff, performed in software when the radio lacks it.

use crate::types::{C_PHY_US_PER_SYMBOL, C_UNIT_BACKOFF_PERIOD};
use rand_core::RngCore;

/// Duration of one unit backoff period.
pub const C_UNIT_BACKOFF_PERIOD_US: u64 = C_UNIT_BACKOFF_PERIOD * C_PHY_US_PER_SYMBOL;

/// Backoff exponent after `csma_attempts` busy channel assessments.
pub fn backoff_exponent(min_be: u8, max_be: u8, csma_attempts: u8) -> u8 {
    min_be.saturating_add(csma_attempts).min(max_be)
}

/// Random backoff delay in `[0, 2^be)` unit backoff periods.
pub fn backoff_delay_us<G: RngCore + ?Sized>(rng: &mut G, be: u8) -> u64 {
    let periods = rng.next_u32() & ((1u32 << be.min(31)) - 1);
    periods as u64 * C_UNIT_BACKOFF_PERIOD_US
}
