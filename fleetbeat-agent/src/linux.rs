//! CPU and memory readings from procfs.
//!
//! CPU usage is cumulative since boot: the first five fields of the aggregate
//! `cpu` line in `/proc/stat` (user, nice, system, idle, iowait), where
//! used = sum - idle and total = sum. Memory is read from `/proc/meminfo`.

use crate::stats::{StatError, Usage};

/// Busy/total ticks from the aggregate CPU counters.
pub fn cpu_usage_from_ticks(user: u64, nice: u64, system: u64, idle: u64, iowait: u64) -> Usage {
    let total = user
        .saturating_add(nice)
        .saturating_add(system)
        .saturating_add(idle)
        .saturating_add(iowait);
    let used = total.saturating_sub(idle);
    Usage::new(used as f64, total as f64)
}

/// Used/total memory in bytes. A missing `MemAvailable` falls back to
/// `MemFree`.
pub fn memory_usage_from(total: u64, available: Option<u64>, free: u64) -> Usage {
    let available = available.unwrap_or(free).min(total);
    Usage::new((total - available) as f64, total as f64)
}

#[cfg(target_os = "linux")]
mod imp {
    use procfs::{Current, CurrentSI};

    use super::{cpu_usage_from_ticks, memory_usage_from};
    use crate::stats::{StatError, Usage};

    pub fn cpu_usage() -> Result<Usage, StatError> {
        let stat =
            procfs::KernelStats::current().map_err(|e| StatError::Procfs(e.to_string()))?;
        let cpu = &stat.total;
        Ok(cpu_usage_from_ticks(
            cpu.user,
            cpu.nice,
            cpu.system,
            cpu.idle,
            cpu.iowait.unwrap_or(0),
        ))
    }

    pub fn memory() -> Result<Usage, StatError> {
        let info = procfs::Meminfo::current().map_err(|e| StatError::Procfs(e.to_string()))?;
        Ok(memory_usage_from(
            info.mem_total,
            info.mem_available,
            info.mem_free,
        ))
    }

    pub fn cpu_cores() -> u32 {
        match procfs::KernelStats::current() {
            Ok(stat) if !stat.cpu_time.is_empty() => stat.cpu_time.len() as u32,
            _ => super::fallback_cores(),
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use crate::stats::{StatError, Usage};

    pub fn cpu_usage() -> Result<Usage, StatError> {
        Err(StatError::Unsupported("CPU usage"))
    }

    pub fn memory() -> Result<Usage, StatError> {
        Err(StatError::Unsupported("memory usage"))
    }

    pub fn cpu_cores() -> u32 {
        super::fallback_cores()
    }
}

fn fallback_cores() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

/// Aggregate CPU usage since boot.
pub fn cpu_usage() -> Result<Usage, StatError> {
    imp::cpu_usage()
}

/// Memory usage in bytes.
pub fn memory() -> Result<Usage, StatError> {
    imp::memory()
}

/// Number of CPUs listed in `/proc/stat`.
pub fn cpu_cores() -> u32 {
    imp::cpu_cores()
}
