//! Process memory sampling.

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub baseline_mb: f64,
    pub current_mb: f64,
    pub peak_mb: f64,
}

impl MemorySnapshot {
    pub fn delta_mb(&self) -> f64 {
        self.current_mb - self.baseline_mb
    }
}

/// Tracks resident memory of the current process across a measurement window.
///
/// When disabled, or when the platform does not expose process memory,
/// every reading is 0.0 so callers need no special casing.
pub struct MemoryTracker {
    system: System,
    pid: Option<Pid>,
    enabled: bool,
    baseline_mb: f64,
    peak_mb: f64,
    last_mb: f64,
}

impl MemoryTracker {
    pub fn new(enabled: bool) -> Self {
        let pid = if enabled {
            sysinfo::get_current_pid().ok()
        } else {
            None
        };
        let mut tracker = Self {
            system: System::new(),
            pid,
            enabled,
            baseline_mb: 0.0,
            peak_mb: 0.0,
            last_mb: 0.0,
        };
        tracker.reset();
        tracker
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && self.pid.is_some()
    }

    /// Current resident memory of this process in MB.
    pub fn process_memory_mb(&mut self) -> f64 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        if !self.system.refresh_process(pid) {
            return 0.0;
        }
        self.system
            .process(pid)
            .map(|p| p.memory() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    }

    /// Take a reading, updating the peak.
    pub fn sample(&mut self) -> f64 {
        let mb = self.process_memory_mb();
        self.last_mb = mb;
        if mb > self.peak_mb {
            self.peak_mb = mb;
        }
        mb
    }

    /// Start a new window at the current reading.
    pub fn reset(&mut self) {
        let mb = self.process_memory_mb();
        self.baseline_mb = mb;
        self.peak_mb = mb;
        self.last_mb = mb;
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            baseline_mb: self.baseline_mb,
            current_mb: self.last_mb,
            peak_mb: self.peak_mb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_tracker_reports_zero() {
        let mut t = MemoryTracker::new(false);
        assert!(!t.is_enabled());
        assert_eq!(t.sample(), 0.0);
        assert_eq!(t.snapshot(), MemorySnapshot::default());
    }

    #[test]
    fn test_peak_never_below_samples() {
        let mut t = MemoryTracker::new(true);
        let _buf = vec![0u8; 4 * 1024 * 1024];
        let current = t.sample();
        let snap = t.snapshot();
        assert!(snap.peak_mb >= current);
        assert!(snap.peak_mb >= snap.baseline_mb);
    }
}
