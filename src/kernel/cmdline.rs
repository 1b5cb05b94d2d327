// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel Command Line Parsing
//!
//! Reads the scheduler's boot options out of the kernel command line.
//!
//! # Design
//!
//! - Arguments are separated by spaces
//! - Each argument is `key=value`; a bare `key` has an empty value
//! - The last occurrence of a key wins
//! - Numbers may be decimal or `0x`-prefixed hex
//!
//! # Usage
//!
//! ```ignore
//! let config = SchedConfig::from_cmdline("-q -sched=prio -sched-slice=8 run alarm");
//! assert_eq!(config.policy, SchedPolicy::Priority);
//! assert_eq!(config.time_slice, 8);
//! ```

use crate::kernel::sched::policy::SchedPolicy;
use crate::log_warn;

/// ============================================================================
/// Scheduler Configuration
/// ============================================================================

/// Command line key selecting the ready-queue policy
pub const SCHED_POLICY_KEY: &str = "-sched";

/// Command line key overriding the time slice
pub const SCHED_SLICE_KEY: &str = "-sched-slice";

/// Default number of timer ticks a thread may run before preemption
pub const TIME_SLICE_DEFAULT: u32 = 4;

/// Boot-time scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Ready-queue policy, fixed for the lifetime of the scheduler
    pub policy: SchedPolicy,

    /// Ticks per time slice
    pub time_slice: u32,
}

impl SchedConfig {
    /// Default configuration: FIFO with the default slice
    pub const fn new() -> Self {
        Self {
            policy: SchedPolicy::Fifo,
            time_slice: TIME_SLICE_DEFAULT,
        }
    }

    /// Configuration with the given policy and the default slice
    pub const fn with_policy(policy: SchedPolicy) -> Self {
        Self {
            policy,
            time_slice: TIME_SLICE_DEFAULT,
        }
    }

    /// Parse the scheduler options from a boot command line
    ///
    /// An unknown policy name is fatal. A malformed or zero slice keeps
    /// the default and logs a warning.
    pub fn from_cmdline(cmdline: &str) -> Self {
        let mut config = Self::new();

        if let Some(name) = cmdline_get(cmdline, SCHED_POLICY_KEY) {
            config.policy = match SchedPolicy::from_name(name) {
                Ok(policy) => policy,
                Err(_) => crate::fatal!("unknown scheduling policy '{}'", name),
            };
        }

        if let Some(value) = cmdline_get(cmdline, SCHED_SLICE_KEY) {
            match cmdline_get_uint32(cmdline, SCHED_SLICE_KEY, 0) {
                0 => log_warn!("ignoring bad {} value '{}'", SCHED_SLICE_KEY, value),
                slice => config.time_slice = slice,
            }
        }

        config
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// ============================================================================
/// Public API
/// ============================================================================

/// Get the value of `key` from a command line
///
/// # Returns
///
/// The value of the last matching argument, `Some("")` for a bare key,
/// or `None` if the key is absent.
pub fn cmdline_get<'a>(cmdline: &'a str, key: &str) -> Option<&'a str> {
    cmdline
        .split(' ')
        .filter(|arg| !arg.is_empty())
        .filter_map(|arg| match arg.split_once('=') {
            Some((k, v)) if k == key => Some(v),
            None if arg == key => Some(""),
            _ => None,
        })
        .last()
}

/// Get a uint32 value from a command line
///
/// # Arguments
///
/// * `key` - Key to look up
/// * `default` - Default value if key not found or invalid
pub fn cmdline_get_uint32(cmdline: &str, key: &str, default: u32) -> u32 {
    cmdline_get(cmdline, key)
        .and_then(parse_uint32)
        .unwrap_or(default)
}

/// Parse a decimal or `0x`-prefixed hex number
fn parse_uint32(value: &str) -> Option<u32> {
    let (digits, base) = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (value, 10),
    };

    if digits.is_empty() {
        return None;
    }

    u32::from_str_radix(digits, base).ok()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmdline_empty() {
        assert!(cmdline_get("", "-sched").is_none());
        assert_eq!(SchedConfig::from_cmdline(""), SchedConfig::new());
    }

    #[test]
    fn test_cmdline_last_wins() {
        let line = "-sched=fifo  -q -sched=prio";
        assert_eq!(cmdline_get(line, "-sched"), Some("prio"));
        assert_eq!(cmdline_get(line, "-q"), Some(""));
        assert_eq!(cmdline_get(line, "-sched-slice"), None);
    }

    #[test]
    fn test_cmdline_get_uint32() {
        let line = "a=123 b=0x1ff c=0XABC d=zz e=";
        assert_eq!(cmdline_get_uint32(line, "a", 0), 123);
        assert_eq!(cmdline_get_uint32(line, "b", 0), 0x1ff);
        assert_eq!(cmdline_get_uint32(line, "c", 0), 0xABC);
        assert_eq!(cmdline_get_uint32(line, "d", 7), 7);
        assert_eq!(cmdline_get_uint32(line, "e", 9), 9);
        assert_eq!(cmdline_get_uint32(line, "missing", 42), 42);
    }

    #[test]
    fn test_sched_config_from_cmdline() {
        let config = SchedConfig::from_cmdline("-q -sched=prio -sched-slice=8 run alarm-multiple");
        assert_eq!(config.policy, SchedPolicy::Priority);
        assert_eq!(config.time_slice, 8);
    }

    #[test]
    fn test_sched_config_bad_slice_keeps_default() {
        let config = SchedConfig::from_cmdline("-sched-slice=0");
        assert_eq!(config.time_slice, TIME_SLICE_DEFAULT);
        let config = SchedConfig::from_cmdline("-sched-slice=fast");
        assert_eq!(config.time_slice, TIME_SLICE_DEFAULT);
    }

    #[test]
    fn test_sched_config_accepts_unimplemented_names() {
        // Rejected later, when the scheduler is initialised.
        assert_eq!(SchedConfig::from_cmdline("-sched=fair").policy, SchedPolicy::FairShare);
        assert_eq!(SchedConfig::from_cmdline("-sched=mlfqs").policy, SchedPolicy::Mlfqs);
    }

    #[test]
    #[should_panic(expected = "unknown scheduling policy")]
    fn test_sched_config_unknown_policy_is_fatal() {
        SchedConfig::from_cmdline("-sched=lottery");
    }
}
