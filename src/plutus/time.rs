use chrono::NaiveDate;
use serde::Serialize;

/// Slot length of every era since Shelley.
///
/// Byron used 20 second slots, so times derived for slots before the Shelley hard fork are
/// off. Transactions with Byron era validity bounds are not expected.
pub const SLOT_LENGTH_MS: u64 = 1000;

const PICOSECONDS_PER_MILLISECOND: u64 = 1_000_000_000;

/// Chain start as reported by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SystemStart {
    pub year: i32,
    /// 1-based day of the year
    #[serde(rename = "day")]
    pub day_of_year: u32,
    #[serde(rename = "picoseconds")]
    pub picoseconds_of_day: u64,
}

impl SystemStart {
    /// POSIX milliseconds, `None` if the date does not exist
    pub fn unix_millis(&self) -> Option<i64> {
        let midnight = NaiveDate::from_yo_opt(self.year, self.day_of_year)?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
            .timestamp_millis();

        Some(midnight + (self.picoseconds_of_day / PICOSECONDS_PER_MILLISECOND) as i64)
    }
}

/// Wide enough for every `u64` slot, so validity bounds far in the future never overflow.
pub fn slot_to_posix_ms(slot: u64, system_start_ms: i64) -> i128 {
    i128::from(system_start_ms) + i128::from(slot) * i128::from(SLOT_LENGTH_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_system_start() {
        // 2017-09-23T21:44:51Z
        let start = SystemStart {
            year: 2017,
            day_of_year: 266,
            picoseconds_of_day: 78_291_000_000_000_000,
        };

        assert_eq!(start.unix_millis(), Some(1_506_203_091_000));
    }

    #[test]
    fn test_invalid_day() {
        let start = SystemStart {
            year: 2023,
            day_of_year: 366,
            picoseconds_of_day: 0,
        };

        assert_eq!(start.unix_millis(), None);
    }

    #[test]
    fn test_slot_to_posix() {
        assert_eq!(slot_to_posix_ms(0, 1_000), 1_000);
        assert_eq!(slot_to_posix_ms(42, 1_666_656_000_000), 1_666_656_042_000);
    }

    #[test]
    fn test_slot_to_posix_never_overflows() {
        assert_eq!(
            slot_to_posix_ms(u64::MAX, i64::MAX),
            i128::from(i64::MAX) + i128::from(u64::MAX) * 1_000
        );
        assert_eq!(slot_to_posix_ms(u64::MAX, 0), 18_446_744_073_709_551_615_000);
    }
}
