/// Properties of the timescale the grandmaster distributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimePropertiesDS {
    pub current_utc_offset: i16,
    pub current_utc_offset_valid: bool,
    pub leap59: bool,
    pub leap61: bool,
    pub time_traceable: bool,
    pub frequency_traceable: bool,
    pub ptp_timescale: bool,
    pub time_source: u8,
}
