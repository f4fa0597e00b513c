//! Resource accounting: quota conversion and usage derivation.
//!
//! Callers express data-transfer quota in fractional gigabytes; storage keeps
//! exact bytes. "Unlimited" is the negative sentinel (`-1` by convention) so
//! no nullable column is needed. Service time is metered but not
//! quota-limited, and always rounds up to whole hours.

/// Quota sentinel for "unlimited".
pub const UNLIMITED_QUOTA: i64 = -1;

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Convert a quota in gigabytes to the stored byte count.
///
/// Positive values round to the nearest byte, zero stays zero (no usage
/// tracked), and any negative value collapses to the unlimited sentinel.
#[allow(clippy::cast_possible_truncation)]
pub fn quota_bytes(gigabytes: f64) -> i64 {
    if gigabytes > 0.0 {
        (gigabytes * BYTES_PER_GB).round() as i64
    } else if gigabytes == 0.0 {
        0
    } else {
        UNLIMITED_QUOTA
    }
}

/// The allocated quota in gigabytes, or `-1.0` when unlimited or untracked.
#[allow(clippy::cast_precision_loss)]
pub fn allocated_gigabytes(allocated: i64) -> f64 {
    if allocated > 0 {
        allocated as f64 / BYTES_PER_GB
    } else {
        -1.0
    }
}

/// Remaining allowance in gigabytes.
///
/// `-1.0` when the allocation is unlimited or untracked. Never clamped:
/// a negative result means the account is over quota, which is a valid,
/// reportable state.
#[allow(clippy::cast_precision_loss)]
pub fn free_gigabytes(allocated: i64, used: u64) -> f64 {
    if allocated <= 0 {
        return -1.0;
    }
    (allocated as f64 - used as f64) / BYTES_PER_GB
}

/// Whole service hours consumed since the last refresh.
///
/// A partial hour counts as a full hour.
#[allow(clippy::cast_precision_loss)]
pub fn service_hours_used(last_refresh: i64, now: i64) -> f64 {
    let elapsed_secs = (now - last_refresh).max(0) as f64;
    (elapsed_secs / 3600.0).ceil()
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn quota_conversion() {
        assert_eq!(quota_bytes(0.0), 0);
        assert_eq!(quota_bytes(-5.0), UNLIMITED_QUOTA);
        assert_eq!(quota_bytes(1.0), 1_073_741_824);
        assert_eq!(quota_bytes(5.0), 5_368_709_120);
        // fractional quotas round, not truncate
        assert_eq!(quota_bytes(1.5), 1_610_612_736);
    }

    #[test]
    fn allocated_sentinels() {
        assert_eq!(allocated_gigabytes(UNLIMITED_QUOTA), -1.0);
        assert_eq!(allocated_gigabytes(0), -1.0);
        assert_eq!(allocated_gigabytes(10 * 1_073_741_824), 10.0);
    }

    #[test]
    fn free_space_reporting() {
        let gb = 1_073_741_824u64;
        assert_eq!(free_gigabytes(UNLIMITED_QUOTA, 12345), -1.0);
        assert_eq!(free_gigabytes(0, 0), -1.0);
        #[allow(clippy::cast_possible_wrap)]
        let ten_gb = (10 * gb) as i64;
        assert_eq!(free_gigabytes(ten_gb, 3 * gb), 7.0);
        // over quota is reported, not clamped
        assert_eq!(free_gigabytes(ten_gb, 12 * gb), -2.0);
    }

    #[test]
    fn service_hours_round_up() {
        let now = 1_700_000_000;
        assert_eq!(service_hours_used(now, now), 0.0);
        assert_eq!(service_hours_used(now - 90 * 60, now), 2.0);
        assert_eq!(service_hours_used(now - 3600, now), 1.0);
        assert_eq!(service_hours_used(now - 3601, now), 2.0);
        // a clock skew backwards never produces negative usage
        assert_eq!(service_hours_used(now + 60, now), 0.0);
    }
}
