//! Strict parsers for the telemetry command battery.
//!
//! Unlike a best-effort dashboard parser, every function here rejects
//! output that does not have the expected shape. Callers turn the returned
//! reason into a [`super::CollectionError::Parse`].

/// Result type for single-query parsing; the error is a reason string
pub type ParseResult<T> = Result<T, String>;

/// Stateless parser for telemetry query output
pub struct TelemetryParser;

impl TelemetryParser {
    /// Extracts `PRETTY_NAME` from `/etc/os-release`, falling back
    /// to `NAME` + `VERSION` if `PRETTY_NAME` is absent.
    pub fn os_name(os_release: &str) -> ParseResult<String> {
        let mut pretty_name = None;
        let mut name = None;
        let mut version = None;

        for line in os_release.lines() {
            let line = line.trim();
            if let Some(val) = line.strip_prefix("PRETTY_NAME=") {
                pretty_name = Some(unquote(val));
            } else if let Some(val) = line.strip_prefix("NAME=") {
                name = Some(unquote(val));
            } else if let Some(val) = line.strip_prefix("VERSION=") {
                version = Some(unquote(val));
            }
        }

        pretty_name
            .filter(|n| !n.is_empty())
            .or_else(|| {
                name.filter(|n| !n.is_empty())
                    .map(|n| version.map_or_else(|| n.clone(), |v| format!("{n} {v}")))
            })
            .ok_or_else(|| "neither PRETTY_NAME nor NAME found in os-release".to_string())
    }

    /// Parses the single-line output of `uname -r`
    pub fn kernel_version(output: &str) -> ParseResult<String> {
        let line = output.trim();
        if line.is_empty() || line.lines().count() != 1 {
            return Err(format!("expected one kernel release line, got '{line}'"));
        }
        Ok(line.to_string())
    }

    /// Extracts the CPU model from `/proc/cpuinfo`.
    ///
    /// x86 reports `model name`; several ARM kernels only report
    /// `Hardware` or `Processor`.
    pub fn cpu_model(cpuinfo: &str) -> ParseResult<String> {
        const KEYS: [&str; 4] = ["model name", "Hardware", "Processor", "cpu model"];

        KEYS.iter()
            .find_map(|key| {
                cpuinfo.lines().find_map(|line| {
                    let (k, v) = line.split_once(':')?;
                    (k.trim() == *key && !v.trim().is_empty()).then(|| v.trim().to_string())
                })
            })
            .ok_or_else(|| "no CPU model line in /proc/cpuinfo".to_string())
    }

    /// Parses the output of `nproc`; zero is rejected
    pub fn cpu_cores(output: &str) -> ParseResult<u32> {
        let cores: u32 = output
            .trim()
            .parse()
            .map_err(|e| format!("invalid CPU count '{}': {e}", output.trim()))?;
        if cores == 0 {
            return Err("CPU count must be greater than zero".to_string());
        }
        Ok(cores)
    }

    /// Memory usage percentage from `/proc/meminfo`:
    /// `(MemTotal - MemAvailable) / MemTotal * 100`
    pub fn memory_usage(meminfo: &str) -> ParseResult<f64> {
        let mut total_kib = None;
        let mut available_kib = None;

        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kib = Some(parse_kib_value(rest)?);
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kib = Some(parse_kib_value(rest)?);
            }
        }

        let total_kib = total_kib.ok_or("MemTotal not found in /proc/meminfo")?;
        let available_kib = available_kib.ok_or("MemAvailable not found in /proc/meminfo")?;
        if total_kib == 0 {
            return Err("MemTotal is zero".to_string());
        }

        let used = total_kib.saturating_sub(available_kib);
        Ok(clamp_percent(used as f64 / total_kib as f64 * 100.0))
    }

    /// Root filesystem usage from `df -Pk /`:
    /// `used / (used + available) * 100`.
    ///
    /// Format: `Filesystem  1024-blocks  Used  Available  Capacity  Mounted`
    pub fn disk_usage(df: &str) -> ParseResult<f64> {
        let line = df
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .find(|l| !l.starts_with("Filesystem"))
            .ok_or("empty df output")?;

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(format!("too few fields in df output: '{line}'"));
        }

        let used_kib: u64 = parts[2]
            .parse()
            .map_err(|e| format!("invalid used blocks '{}': {e}", parts[2]))?;
        let available_kib: u64 = parts[3]
            .parse()
            .map_err(|e| format!("invalid available blocks '{}': {e}", parts[3]))?;

        let capacity = used_kib
            .checked_add(available_kib)
            .ok_or_else(|| format!("df block counts overflow: '{line}'"))?;
        if capacity == 0 {
            return Ok(0.0);
        }
        Ok(clamp_percent(used_kib as f64 / capacity as f64 * 100.0))
    }

    /// Parses `/proc/loadavg`.
    ///
    /// Format: `0.52 0.34 0.28 2/1234 56789`
    pub fn load_average(loadavg: &str) -> ParseResult<[f64; 3]> {
        let parts: Vec<&str> = loadavg.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(format!("too few fields in /proc/loadavg: '{}'", loadavg.trim()));
        }

        let mut values = [0.0; 3];
        for (slot, raw) in values.iter_mut().zip(&parts) {
            let value: f64 = raw
                .parse()
                .map_err(|e| format!("invalid load average '{raw}': {e}"))?;
            if !value.is_finite() || value < 0.0 {
                return Err(format!("load average out of range: {value}"));
            }
            *slot = value;
        }
        Ok(values)
    }

    /// Parses `/proc/uptime` into whole seconds
    pub fn uptime_secs(uptime: &str) -> ParseResult<u64> {
        let first = uptime
            .split_whitespace()
            .next()
            .ok_or("empty /proc/uptime")?;
        let secs: f64 = first
            .parse()
            .map_err(|e| format!("invalid uptime '{first}': {e}"))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(format!("uptime out of range: {secs}"));
        }
        Ok(secs as u64)
    }
}

/// Parses a value like `  16384000 kB` into KiB
fn parse_kib_value(s: &str) -> ParseResult<u64> {
    let raw = s.split_whitespace().next().ok_or("missing meminfo value")?;
    raw.parse()
        .map_err(|e| format!("invalid meminfo value '{raw}': {e}"))
}

fn unquote(val: &str) -> String {
    val.trim().trim_matches('"').trim_matches('\'').to_string()
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_name_prefers_pretty_name() {
        let os_release = "NAME=\"Ubuntu\"\nVERSION=\"24.04.1 LTS (Noble Numbat)\"\nPRETTY_NAME=\"Ubuntu 24.04.1 LTS\"\n";
        assert_eq!(TelemetryParser::os_name(os_release).unwrap(), "Ubuntu 24.04.1 LTS");
    }

    #[test]
    fn test_os_name_fallback() {
        let os_release = "NAME=\"Alpine Linux\"\nVERSION=\"3.20\"\n";
        assert_eq!(TelemetryParser::os_name(os_release).unwrap(), "Alpine Linux 3.20");
        assert!(TelemetryParser::os_name("ID=debian\n").is_err());
    }

    #[test]
    fn test_kernel_version() {
        assert_eq!(
            TelemetryParser::kernel_version("6.8.0-45-generic\n").unwrap(),
            "6.8.0-45-generic"
        );
        assert!(TelemetryParser::kernel_version("\n").is_err());
    }

    #[test]
    fn test_cpu_model() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: AuthenticAMD\nmodel name\t: AMD EPYC 7543 32-Core Processor\n";
        assert_eq!(
            TelemetryParser::cpu_model(cpuinfo).unwrap(),
            "AMD EPYC 7543 32-Core Processor"
        );
        let arm = "processor\t: 0\nBogoMIPS\t: 50.00\nHardware\t: BCM2835\n";
        assert_eq!(TelemetryParser::cpu_model(arm).unwrap(), "BCM2835");
        assert!(TelemetryParser::cpu_model("processor\t: 0\n").is_err());
    }

    #[test]
    fn test_cpu_cores_rejects_zero_and_garbage() {
        assert_eq!(TelemetryParser::cpu_cores("4\n").unwrap(), 4);
        assert!(TelemetryParser::cpu_cores("0").is_err());
        assert!(TelemetryParser::cpu_cores("four").is_err());
    }

    #[test]
    fn test_memory_percent() {
        let meminfo = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    4096000 kB\n";
        let usage = TelemetryParser::memory_usage(meminfo).unwrap();
        assert!((usage - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_memory_requires_available() {
        let meminfo = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\n";
        assert!(TelemetryParser::memory_usage(meminfo).is_err());
        assert!(TelemetryParser::memory_usage("MemTotal: abc kB\nMemAvailable: 1 kB\n").is_err());
    }

    #[test]
    fn test_disk_percent() {
        let df = "Filesystem     1024-blocks     Used Available Capacity Mounted on\n/dev/sda1        102400000 51200000  51200000      50% /\n";
        let usage = TelemetryParser::disk_usage(df).unwrap();
        assert!((usage - 50.0).abs() < 0.01);
        assert!(TelemetryParser::disk_usage("Filesystem 1024-blocks Used\n").is_err());
    }

    #[test]
    fn test_disk_block_overflow_is_rejected() {
        let df = format!(
            "Filesystem 1024-blocks Used Available Capacity Mounted on\n/dev/sda1 1 {} {} 100% /\n",
            u64::MAX,
            1
        );
        let err = TelemetryParser::disk_usage(&df).unwrap_err();
        assert!(err.contains("overflow"));
    }

    #[test]
    fn test_load_average() {
        let load = TelemetryParser::load_average("0.52 0.34 0.28 3/1234 56789\n").unwrap();
        assert!((load[0] - 0.52).abs() < f64::EPSILON);
        assert!((load[2] - 0.28).abs() < f64::EPSILON);
        assert!(TelemetryParser::load_average("0.52 0.34").is_err());
        assert!(TelemetryParser::load_average("0.52 x 0.28").is_err());
    }

    #[test]
    fn test_uptime() {
        assert_eq!(TelemetryParser::uptime_secs("35999.42 140000.11\n").unwrap(), 35_999);
        assert!(TelemetryParser::uptime_secs("").is_err());
        assert!(TelemetryParser::uptime_secs("-5 0").is_err());
    }
}
