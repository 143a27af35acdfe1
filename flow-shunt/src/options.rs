//! Typed per-shunt configuration: plain struct fields rather than a
//! property bag, so every tuning knob is checked at compile time.

/// Tuning knobs shared by every shunt kind.
#[derive(Debug, Clone, Copy)]
pub struct ShuntOptions {
    /// Size of each `read()`/`recv()` performed per readiness wakeup.
    pub read_chunk_size: usize,
    /// Bytes buffered on the write side before the shunt reports
    /// `need_writes` backpressure upstream.
    pub write_high_water: usize,
    /// Largest single UDP datagram accepted before it is reported as
    /// `socket.oversized_packet` and dropped.
    pub max_datagram_size: usize,
}

impl Default for ShuntOptions {
    fn default() -> Self {
        Self {
            read_chunk_size: 64 * 1024,
            write_high_water: 256 * 1024,
            max_datagram_size: 65_507,
        }
    }
}
