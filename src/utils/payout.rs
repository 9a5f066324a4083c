/// Points for an all-winning parlay of 1..=8 legs
pub const PAYOUT_TABLE: [u64; 8] = [1, 3, 6, 10, 20, 40, 75, 150];

/// A bucket needs at least this many decisive winners to pay
pub const MIN_PARLAY_LEGS: u32 = 2;

/// Table value for `legs` winning legs.
///
/// Past eight legs the payout doubles per extra leg and saturates at
/// `u64::MAX`.
pub fn payout_for_legs(legs: u32) -> u64 {
    match legs {
        0 => 0,
        1..=8 => PAYOUT_TABLE[legs as usize - 1],
        _ => {
            let top = PAYOUT_TABLE[PAYOUT_TABLE.len() - 1];
            let extra = legs - PAYOUT_TABLE.len() as u32;
            2u64.checked_pow(extra)
                .and_then(|factor| top.checked_mul(factor))
                .unwrap_or(u64::MAX)
        }
    }
}

/// Points for a fully graded bucket. Pushes never reach this function.
pub fn bucket_payout(wins: u32, losses: u32) -> u64 {
    if losses > 0 || wins < MIN_PARLAY_LEGS {
        return 0;
    }
    payout_for_legs(wins)
}
