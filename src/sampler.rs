//! MetricsSampler - Produces one [`Sample`] per tick
//!
//! The sampler owns the `sysinfo` handles and publishes each finished sample into a shared
//! [`SampleSlot`]. Publishing swaps the whole snapshot, so readers see either the previous or the
//! next complete sample, never a mix.
//!
//! ## Tick Layout
//!
//! ```text
//! refresh CPU ── 1s interval ── refresh CPU      (doubles as tick pacing)
//! warm-up process CPU ── 0.5s settle ── measure process CPU + RSS
//! memory + disk ── publish
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use arc_swap::ArcSwap;
use sysinfo::{Disks, MemoryRefreshKind, Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

use crate::{
    CpuProcess, MemoryProcess, Sample,
    util::{bytes_to_gb, bytes_to_mb, percent, round1, unix_now},
};

/// Interval over which the host CPU percentage is measured
pub const CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between the per-process CPU warm-up pass and the measurement pass
pub const PROCESS_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Pause after a failed tick before sampling again
pub const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

/// Shared "current sample" slot. Written by the sampler, read by every client loop.
#[derive(Debug, Clone)]
pub struct SampleSlot {
    inner: Arc<ArcSwap<Sample>>,
}

impl Default for SampleSlot {
    fn default() -> Self {
        Self::new(Sample::default())
    }
}

impl SampleSlot {
    pub fn new(initial: Sample) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn publish(&self, sample: Sample) {
        self.inner.store(Arc::new(sample));
    }

    pub fn latest(&self) -> Arc<Sample> {
        self.inner.load_full()
    }
}

#[derive(Debug)]
pub enum SampleError {
    /// The host reported no memory at all
    MemoryUnavailable,

    /// No disk is mounted at the configured path
    DiskNotFound(PathBuf),
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::MemoryUnavailable => write!(f, "memory information unavailable"),
            SampleError::DiskNotFound(path) => {
                write!(f, "no disk mounted at {}", path.display())
            }
        }
    }
}

impl std::error::Error for SampleError {}

pub struct MetricsSampler {
    system: System,
    disks: Disks,
    disk_path: PathBuf,
    top_processes: usize,
    slot: SampleSlot,
}

impl MetricsSampler {
    pub fn new(slot: SampleSlot, top_processes: usize, disk_path: impl Into<PathBuf>) -> Self {
        Self {
            system: System::new(),
            disks: Disks::new_with_refreshed_list(),
            disk_path: disk_path.into(),
            top_processes,
            slot,
        }
    }

    /// Sample until the running flag turns false.
    ///
    /// This blocks the calling thread; run it via `spawn_blocking` or a dedicated thread.
    #[instrument(skip_all)]
    pub fn run(mut self, running: watch::Receiver<bool>, clients: impl Fn() -> usize) {
        debug!("starting sampler");
        let mut last_status: Option<Instant> = None;

        while *running.borrow() {
            match self.sample() {
                Ok(sample) => {
                    if last_status.is_none_or(|at| at.elapsed() > STATUS_LOG_INTERVAL) {
                        info!(
                            "📊 CPU: {:.1}% | RAM: {:.1}% | Disk: {:.1}% | Clients: {}",
                            sample.cpu_percent,
                            sample.memory_percent,
                            sample.disk_percent,
                            clients()
                        );
                        last_status = Some(Instant::now());
                    }
                    self.slot.publish(sample);
                }
                Err(e) => {
                    error!("sampling failed: {e}");
                    std::thread::sleep(FAILURE_BACKOFF);
                }
            }
        }

        debug!("sampler stopped");
    }

    /// Take one sample. Blocks for roughly [`CPU_SAMPLE_INTERVAL`] + [`PROCESS_SETTLE_DELAY`].
    pub fn sample(&mut self) -> Result<Sample, SampleError> {
        self.system.refresh_cpu_usage();
        std::thread::sleep(CPU_SAMPLE_INTERVAL);
        self.system.refresh_cpu_usage();
        let cpu_percent = percent(self.system.global_cpu_usage() as f64);

        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let memory_total = self.system.total_memory();
        if memory_total == 0 {
            return Err(SampleError::MemoryUnavailable);
        }
        let memory_used = memory_total.saturating_sub(self.system.available_memory());

        let (disk_total, disk_used) = self.disk_usage()?;

        let (top_cpu_processes, top_memory_processes) = self.rank_processes();

        Ok(Sample {
            cpu_percent,
            memory_percent: percent(memory_used as f64 / memory_total as f64 * 100.0),
            memory_total_gb: bytes_to_gb(memory_total),
            memory_used_gb: bytes_to_gb(memory_used),
            disk_percent: if disk_total == 0 {
                0.0
            } else {
                percent(disk_used as f64 / disk_total as f64 * 100.0)
            },
            disk_total_gb: bytes_to_gb(disk_total),
            disk_used_gb: bytes_to_gb(disk_used),
            top_cpu_processes,
            top_memory_processes,
            timestamp: unix_now(),
        })
    }

    fn disk_usage(&mut self) -> Result<(u64, u64), SampleError> {
        self.disks.refresh(true);
        let path =
            std::fs::canonicalize(&self.disk_path).unwrap_or_else(|_| self.disk_path.clone());
        let disk = containing_mount(self.disks.list(), &path, |disk| disk.mount_point())
            .ok_or_else(|| SampleError::DiskNotFound(self.disk_path.clone()))?;
        let total = disk.total_space();
        Ok((total, total.saturating_sub(disk.available_space())))
    }

    fn rank_processes(&mut self) -> (Vec<CpuProcess>, Vec<MemoryProcess>) {
        // warm-up pass starts per-process CPU accounting
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        std::thread::sleep(PROCESS_SETTLE_DELAY);
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        let mut processes: Vec<(&Pid, &Process)> = self.system.processes().iter().collect();
        processes.sort_by_key(|(pid, _)| **pid);

        let by_cpu = processes
            .iter()
            .filter_map(|(pid, process)| read_cpu(pid.as_u32(), process))
            .collect();
        let by_memory = processes
            .iter()
            .filter_map(|(pid, process)| read_memory(pid.as_u32(), process))
            .collect();

        (
            top_n(by_cpu, self.top_processes, |p: &CpuProcess| p.cpu_percent),
            top_n(by_memory, self.top_processes, |p: &MemoryProcess| p.memory_mb),
        )
    }
}

/// The entry whose mount point is the longest prefix of `path`, i.e. the filesystem holding it.
fn containing_mount<'a, T>(
    mounts: &'a [T],
    path: &Path,
    mount_point: impl Fn(&T) -> &Path,
) -> Option<&'a T> {
    mounts
        .iter()
        .filter(|entry| path.starts_with(mount_point(entry)))
        .max_by_key(|entry| mount_point(entry).components().count())
}

fn process_name(process: &Process) -> String {
    process.name().to_string_lossy().into_owned()
}

/// Interval CPU usage of one process; `None` for idle or unreadable processes.
fn read_cpu(pid: u32, process: &Process) -> Option<CpuProcess> {
    let usage = process.cpu_usage() as f64;
    if !usage.is_finite() || usage <= 0.0 {
        return None;
    }

    Some(CpuProcess {
        pid,
        name: process_name(process),
        cpu_percent: round1(usage),
    })
}

/// Resident memory of one process; `None` when it could not be read.
fn read_memory(pid: u32, process: &Process) -> Option<MemoryProcess> {
    let rss = process.memory();
    if rss == 0 {
        return None;
    }

    Some(MemoryProcess {
        pid,
        name: process_name(process),
        memory_mb: bytes_to_mb(rss),
    })
}

/// Keep the `cap` highest entries by `key`, descending. Equal keys keep their input order.
pub fn top_n<T>(mut items: Vec<T>, cap: usize, key: impl Fn(&T) -> f64) -> Vec<T> {
    items.sort_by(|a, b| key(b).total_cmp(&key(a)));
    items.truncate(cap);
    items
}
