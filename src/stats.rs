use std::time::Duration;

/// Arithmetic mean of a set of round-trip durations, rounded to whole
/// milliseconds.
pub(crate) fn rounded_mean_ms(durations: &[Duration]) -> u64 {
    if durations.is_empty() {
        return 0;
    }

    let total_ms: f64 =
        durations.iter().map(|duration| duration.as_secs_f64() * 1000.0).sum();

    (total_ms / durations.len() as f64).round() as u64
}

/// Cumulative-average throughput: total bytes moved over total elapsed
/// time, in Mbps.
pub(crate) fn cumulative_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();

    if secs <= 0.0 {
        return 0.0;
    }

    (bytes as f64 * 8.0) / secs / (1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_mean_ms() {
        let durations = vec![
            Duration::from_millis(40),
            Duration::from_millis(50),
            Duration::from_millis(60),
        ];

        assert_eq!(rounded_mean_ms(&durations), 50);
    }

    #[test]
    fn test_rounded_mean_ms_rounds_half_up() {
        let durations =
            vec![Duration::from_millis(10), Duration::from_millis(11)];

        assert_eq!(rounded_mean_ms(&durations), 11);
    }

    #[test]
    fn test_rounded_mean_ms_empty() {
        assert_eq!(rounded_mean_ms(&[]), 0);
    }

    #[test]
    fn test_cumulative_mbps() {
        // 10 MiB in one second is exactly 80 Mbps on the 2^20 scale.
        let mbps = cumulative_mbps(10 * 1024 * 1024, Duration::from_secs(1));
        assert!((mbps - 80.0).abs() < 0.001);
    }

    #[test]
    fn test_cumulative_mbps_zero_elapsed() {
        assert_eq!(cumulative_mbps(1_000_000, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_cumulative_mbps_zero_bytes() {
        assert_eq!(cumulative_mbps(0, Duration::from_secs(5)), 0.0);
    }
}
