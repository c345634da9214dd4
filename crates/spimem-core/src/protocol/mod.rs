//! Per-family command sequences
//!
//! Free functions generic over [`SpiMaster`](crate::bus::SpiMaster). Each
//! takes the chip-select line to talk to; none of them keep state.

pub mod nand;
pub mod nor;
pub mod psram;

/// Number of polls that fit in `timeout_us` at `poll_delay_us` spacing
pub(crate) const fn max_polls(poll_delay_us: u32, timeout_us: u32) -> u32 {
    if poll_delay_us > 0 {
        let n = timeout_us / poll_delay_us;
        if n == 0 {
            1
        } else {
            n
        }
    } else {
        timeout_us // Fall back to polling once per microsecond
    }
}
