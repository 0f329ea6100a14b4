use crate::memory::{TypeAddr, FONT_START};

/// Which register 8XY6 / 8XYE shift.
///
/// Interpreters disagree here: the original COSMAC VIP copied VY into VX and
/// shifted that, while most later interpreters shift VX in place and ignore Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShiftSource {
    /// Shift VX in place
    #[default]
    Vx,
    /// VX := VY, then shift
    Vy,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub shift_source: ShiftSource,
    // start of the 80 byte font region, must leave room below 0x200
    pub font_base: TypeAddr,
    // fixed seed for CXNN, entropy when None
    pub rng_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shift_source: ShiftSource::default(),
            font_base: FONT_START,
            rng_seed: None,
        }
    }
}
