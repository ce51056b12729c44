//! Property-based tests for telemetry parsing

use proptest::prelude::*;
use vpstools_core::telemetry::TelemetryParser;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Memory usage stays a percentage even when available exceeds total
    #[test]
    fn prop_memory_usage_is_percentage(
        total in 1u64..=1_000_000_000,
        available in 0u64..=2_000_000_000,
    ) {
        let meminfo = format!(
            "MemTotal:       {total} kB\nMemFree:        0 kB\nMemAvailable:   {available} kB\n"
        );
        let usage = TelemetryParser::memory_usage(&meminfo).unwrap();
        prop_assert!((0.0..=100.0).contains(&usage));
    }

    /// Disk usage stays a percentage for any block counts
    #[test]
    fn prop_disk_usage_is_percentage(used in 0u64..=u64::from(u32::MAX), available in 0u64..=u64::from(u32::MAX)) {
        let df = format!(
            "Filesystem 1024-blocks Used Available Capacity Mounted on\n/dev/vda1 {} {used} {available} 50% /\n",
            used + available
        );
        let usage = TelemetryParser::disk_usage(&df).unwrap();
        prop_assert!((0.0..=100.0).contains(&usage));
    }

    /// Any positive core count is accepted verbatim
    #[test]
    fn prop_cpu_cores_accepts_positive(cores in 1u32..=4096) {
        prop_assert_eq!(TelemetryParser::cpu_cores(&format!("{cores}\n")), Ok(cores));
    }

    /// A negative load value anywhere in the triple is rejected
    #[test]
    fn prop_negative_load_rejected(
        position in 0usize..3,
        magnitude in 0.01f64..100.0,
    ) {
        let mut values = ["0.10".to_string(), "0.20".to_string(), "0.30".to_string()];
        values[position] = format!("-{magnitude:.2}");
        let loadavg = format!("{} 1/100 4242\n", values.join(" "));
        prop_assert!(TelemetryParser::load_average(&loadavg).is_err());
    }

    /// Uptime is truncated to whole seconds
    #[test]
    fn prop_uptime_truncates(secs in 0u64..=10_000_000, centis in 0u32..100) {
        let uptime = format!("{secs}.{centis:02} 123.45\n");
        prop_assert_eq!(TelemetryParser::uptime_secs(&uptime), Ok(secs));
    }
}

#[test]
fn zero_cores_rejected() {
    assert!(TelemetryParser::cpu_cores("0\n").is_err());
}

#[test]
fn zero_total_memory_rejected() {
    assert!(TelemetryParser::memory_usage("MemTotal: 0 kB\nMemAvailable: 0 kB\n").is_err());
}
