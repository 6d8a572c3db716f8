//! Point-in-time process health figures attached to breach records.
//!
//! The diagnostic logger only depends on [`RuntimeMetricsProvider`]; the
//! sysinfo-backed implementation is what the binary wires in.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use crate::error::MonitorError;

// ─── Collaborator contract ───────────────────────────────────────

/// Host memory, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatingSystemInfo {
    pub total_physical_memory: u64,
    pub free_physical_memory: u64,
}

/// One memory region of the process, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegionInfo {
    pub name: String,
    pub max: u64,
    pub used: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThreadInfo {
    pub peak_thread_count: u64,
    pub thread_count: u64,
}

/// Immutable health snapshot taken at the moment of a breach.
///
/// Thread figures are `None` when the platform does not expose them; the
/// memory figures are always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeMetricsSnapshot {
    pub total_physical_memory: u64,
    pub free_physical_memory: u64,
    pub heap_max: u64,
    pub heap_used: u64,
    pub peak_thread_count: Option<u64>,
    pub thread_count: Option<u64>,
    pub captured_at: DateTime<Utc>,
}

impl RuntimeMetricsSnapshot {
    /// Memory readings are required; a thread reading failure only blanks
    /// the thread fields.
    pub fn compose(
        os: Result<OperatingSystemInfo, MonitorError>,
        regions: Result<Vec<MemoryRegionInfo>, MonitorError>,
        threads: Result<ThreadInfo, MonitorError>,
    ) -> Result<Self, MonitorError> {
        let os = os?;
        let heap = regions?
            .into_iter()
            .next()
            .ok_or(MonitorError::NoMemoryRegion)?;
        let threads = threads
            .map_err(|e| debug!(error = %e, "thread figures unavailable"))
            .ok();

        Ok(Self {
            total_physical_memory: os.total_physical_memory,
            free_physical_memory: os.free_physical_memory,
            heap_max: heap.max,
            heap_used: heap.used,
            peak_thread_count: threads.map(|t| t.peak_thread_count),
            thread_count: threads.map(|t| t.thread_count),
            captured_at: Utc::now(),
        })
    }
}

pub trait RuntimeMetricsProvider: Send + Sync {
    fn operating_system_info(&self) -> Result<OperatingSystemInfo, MonitorError>;

    /// Ordered regions; the first is the primary heap.
    fn memory_regions(&self) -> Result<Vec<MemoryRegionInfo>, MonitorError>;

    fn thread_info(&self) -> Result<ThreadInfo, MonitorError>;

    fn snapshot(&self) -> Result<RuntimeMetricsSnapshot, MonitorError> {
        RuntimeMetricsSnapshot::compose(
            self.operating_system_info(),
            self.memory_regions(),
            self.thread_info(),
        )
    }
}

// ─── sysinfo-backed provider ─────────────────────────────────────

/// Reads host and process figures through `sysinfo`.
///
/// The primary region is the process resident set, bounded by the cgroup
/// memory limit when one applies and by physical memory otherwise. Peak
/// thread count is the highest count this provider has observed. Thread
/// lists are only available on Linux; elsewhere `thread_info` fails and
/// snapshots carry no thread figures.
pub struct SysinfoProvider {
    system: Mutex<System>,
    pid: Pid,
    peak_threads: AtomicU64,
}

impl SysinfoProvider {
    pub fn new() -> Result<Self, MonitorError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| MonitorError::MetricsUnavailable(e.to_string()))?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
            peak_threads: AtomicU64::new(0),
        })
    }

    /// Host memory plus this process's memory and task list, nothing else.
    fn refresh(&self, system: &mut System) {
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_tasks(),
        );
    }

    fn process<'a>(&self, system: &'a System) -> Result<&'a Process, MonitorError> {
        system.process(self.pid).ok_or_else(|| {
            MonitorError::MetricsUnavailable(format!("process {} not found", self.pid))
        })
    }

    fn read_os(system: &System) -> Result<OperatingSystemInfo, MonitorError> {
        Ok(OperatingSystemInfo {
            total_physical_memory: system.total_memory(),
            free_physical_memory: system.free_memory(),
        })
    }

    fn read_regions(&self, system: &System) -> Result<Vec<MemoryRegionInfo>, MonitorError> {
        let process = self.process(system)?;
        let max = system
            .cgroup_limits()
            .map(|limits| limits.total_memory)
            .unwrap_or_else(|| system.total_memory());

        Ok(vec![
            MemoryRegionInfo {
                name: "resident".into(),
                max,
                used: process.memory(),
            },
            MemoryRegionInfo {
                name: "virtual".into(),
                max: process.virtual_memory(),
                used: process.virtual_memory(),
            },
        ])
    }

    fn read_threads(&self, system: &System) -> Result<ThreadInfo, MonitorError> {
        let thread_count = self
            .process(system)?
            .tasks()
            .map(|tasks| tasks.len() as u64)
            .ok_or_else(|| {
                MonitorError::MetricsUnavailable("thread list not supported here".into())
            })?;

        let previous = self.peak_threads.fetch_max(thread_count, Ordering::Relaxed);
        Ok(ThreadInfo {
            peak_thread_count: previous.max(thread_count),
            thread_count,
        })
    }
}

impl RuntimeMetricsProvider for SysinfoProvider {
    fn operating_system_info(&self) -> Result<OperatingSystemInfo, MonitorError> {
        let mut system = self.system.lock();
        system.refresh_memory();
        Self::read_os(&system)
    }

    fn memory_regions(&self) -> Result<Vec<MemoryRegionInfo>, MonitorError> {
        let mut system = self.system.lock();
        self.refresh(&mut system);
        self.read_regions(&system)
    }

    fn thread_info(&self) -> Result<ThreadInfo, MonitorError> {
        let mut system = self.system.lock();
        self.refresh(&mut system);
        self.read_threads(&system)
    }

    /// One lock and one refresh for all three readings.
    fn snapshot(&self) -> Result<RuntimeMetricsSnapshot, MonitorError> {
        let mut system = self.system.lock();
        self.refresh(&mut system);
        RuntimeMetricsSnapshot::compose(
            Self::read_os(&system),
            self.read_regions(&system),
            self.read_threads(&system),
        )
    }
}

impl std::fmt::Debug for SysinfoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProvider").field("pid", &self.pid).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::FixedMetrics;
    use super::*;

    struct NoRegions;

    /// Memory readings work, thread readings do not.
    struct NoThreadList;

    impl RuntimeMetricsProvider for NoThreadList {
        fn operating_system_info(&self) -> Result<OperatingSystemInfo, MonitorError> {
            FixedMetrics.operating_system_info()
        }
        fn memory_regions(&self) -> Result<Vec<MemoryRegionInfo>, MonitorError> {
            FixedMetrics.memory_regions()
        }
        fn thread_info(&self) -> Result<ThreadInfo, MonitorError> {
            Err(MonitorError::MetricsUnavailable("no thread list".into()))
        }
    }

    impl RuntimeMetricsProvider for NoRegions {
        fn operating_system_info(&self) -> Result<OperatingSystemInfo, MonitorError> {
            FixedMetrics.operating_system_info()
        }
        fn memory_regions(&self) -> Result<Vec<MemoryRegionInfo>, MonitorError> {
            Ok(Vec::new())
        }
        fn thread_info(&self) -> Result<ThreadInfo, MonitorError> {
            FixedMetrics.thread_info()
        }
    }

    #[test]
    fn snapshot_uses_the_first_region_as_heap() {
        let snap = FixedMetrics.snapshot().unwrap();
        assert_eq!(snap.heap_max, 2 << 30);
        assert_eq!(snap.heap_used, 300 << 20);
        assert_eq!(snap.peak_thread_count, Some(24));
        assert_eq!(snap.thread_count, Some(17));
    }

    #[test]
    fn missing_thread_list_keeps_memory_figures() {
        let snap = NoThreadList.snapshot().unwrap();
        assert_eq!(snap.heap_used, 300 << 20);
        assert_eq!(snap.total_physical_memory, 16 << 30);
        assert_eq!(snap.thread_count, None);
        assert_eq!(snap.peak_thread_count, None);
    }

    #[test]
    fn snapshot_without_regions_is_an_error() {
        assert!(matches!(NoRegions.snapshot(), Err(MonitorError::NoMemoryRegion)));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sysinfo_reports_host_memory() {
        let provider = SysinfoProvider::new().unwrap();
        let os = provider.operating_system_info().unwrap();
        assert!(os.total_physical_memory > 0);
        assert!(os.free_physical_memory <= os.total_physical_memory);

        let regions = provider.memory_regions().unwrap();
        assert_eq!(regions[0].name, "resident");
        assert!(regions[0].used > 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn sysinfo_reports_threads_and_tracks_the_peak() {
        let provider = SysinfoProvider::new().unwrap();
        let threads = provider.thread_info().unwrap();
        assert!(threads.thread_count > 0);
        assert!(threads.peak_thread_count >= threads.thread_count);

        let snap = provider.snapshot().unwrap();
        let (count, peak) = (snap.thread_count.unwrap(), snap.peak_thread_count.unwrap());
        assert!(peak >= count);
        assert!(peak >= threads.peak_thread_count);
    }
}
