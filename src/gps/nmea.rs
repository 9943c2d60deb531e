// NMEA 0183 recommended-minimum (RMC) sentence parsing
//
// Only `$GPRMC` sentences with exactly 13 comma-separated fields are
// recognized. Every other sentence on the line is ignored.

/// Sentence identifier of the recommended-minimum fix message
pub const RMC_SENTENCE: &str = "$GPRMC";

/// Field count of a recognized RMC sentence
pub const RMC_FIELDS: usize = 13;

/// One position report
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GpsFix {
    /// UTC time as sent by the receiver (hhmmss[.sss])
    pub utc_time: String,
    /// Latitude as sent by the receiver (ddmm.mmmm)
    pub latitude: String,
    /// Longitude as sent by the receiver (dddmm.mmmm)
    pub longitude: String,
    /// Receiver status was "A" (active)
    pub valid: bool,
}

impl GpsFix {
    /// A void fix: the receiver has no position, all fields empty
    pub fn void() -> Self {
        Self::default()
    }
}

/// Parse one line from the receiver.
///
/// Returns `None` for anything that is not a 13-field RMC sentence with an
/// `A` or `V` status. Field values are passed through verbatim.
pub fn parse(line: &str) -> Option<GpsFix> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != RMC_FIELDS || fields[0] != RMC_SENTENCE {
        return None;
    }

    match fields[2] {
        "A" => Some(GpsFix {
            utc_time: fields[1].to_string(),
            latitude: fields[3].to_string(),
            longitude: fields[5].to_string(),
            valid: true,
        }),
        "V" => Some(GpsFix::void()),
        _ => None,
    }
}
