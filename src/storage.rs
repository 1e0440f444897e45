//! Durable storage for the task snapshot.
//!
//! One JSON file holds the whole snapshot. Writes go to a temp file and are
//! renamed over the target, so a crash mid-write leaves the previous file
//! intact. A corrupt file is copied aside to a timestamped backup and the
//! store is reseeded with sample data; `load` never fails.
//!
//! Frequent mutations are coalesced by `FlushScheduler`: a worker thread
//! keeps the latest snapshot and writes it once per debounce window. The
//! deadline anchors at the first unflushed change, so per-second timer
//! ticks produce one write per window instead of postponing forever.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Local;
use log::{info, warn};

use crate::error::Error;
use crate::store::{Snapshot, SNAPSHOT_VERSION};
use crate::task::{ChecklistItem, Task};

/// Quiet period a burst of mutations must outlast before hitting disk.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(3);

/// Load the snapshot from `path`.
///
/// A missing file seeds the built-in sample snapshot. A file that fails to
/// parse is copied to a timestamped `.bak` sibling (backups are never
/// deleted or overwritten) and replaced with the sample snapshot. Neither
/// case is an error to the caller.
pub fn load(path: &Path) -> Snapshot {
    if !path.exists() {
        let snapshot = default_snapshot();
        if let Err(e) = save(&snapshot, path) {
            warn!("could not seed data file {}: {e}", path.display());
        }
        return snapshot;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            // Unreadable is not corrupt: leave the file alone and run on
            // defaults rather than clobbering something we could not read.
            warn!("could not read data file {}: {e}", path.display());
            return default_snapshot();
        }
    };
    match serde_json::from_str::<Snapshot>(&raw) {
        Ok(snapshot) => {
            if snapshot.version > SNAPSHOT_VERSION {
                warn!(
                    "data file {} has version {} (newer than {}); loading best-effort",
                    path.display(),
                    snapshot.version,
                    SNAPSHOT_VERSION
                );
            }
            snapshot
        }
        Err(e) => {
            warn!("data file {} is corrupt: {e}", path.display());
            match fs::copy(path, backup_path(path)) {
                Ok(_) => info!("backed up corrupt data file beside {}", path.display()),
                Err(e) => warn!("could not back up corrupt data file: {e}"),
            }
            let snapshot = default_snapshot();
            if let Err(e) = save(&snapshot, path) {
                warn!("could not reseed data file {}: {e}", path.display());
            }
            snapshot
        }
    }
}

/// Serialize the snapshot to `path` atomically (temp file + rename).
pub fn save(snapshot: &Snapshot, path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let data = serde_json::to_string_pretty(snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let file = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("tasks.json");
    let mut candidate = path.with_file_name(format!("{file}.{stamp}.bak"));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{file}.{stamp}.{n}.bak"));
        n += 1;
    }
    candidate
}

/// Sample tasks seeded on first run or after corruption recovery.
pub fn default_snapshot() -> Snapshot {
    let mut sketch = Task::new("Sketch the week's plan".into(), "backlog".into(), 15 * 60);
    sketch.description = Some("Decide what actually needs to ship this week.".into());
    sketch.tags = vec!["planning".into()];
    sketch.checklist = vec![
        ChecklistItem::new("Collect loose notes"),
        ChecklistItem::new("Pick three priorities"),
        ChecklistItem::new("Slot them into days"),
    ];

    let mut review = Task::new("Review open pull requests".into(), "in_progress".into(), 25 * 60);
    review.description = Some("Work through the review queue oldest-first.".into());
    review.tags = vec!["code".into(), "review".into()];
    review.checklist = vec![
        ChecklistItem {
            label: "Triage by size".into(),
            done: true,
        },
        ChecklistItem::new("Leave comments"),
    ];
    review.remaining_seconds = 21 * 60;

    let mut explore = Task::new("Try the timer presets".into(), "done".into(), 5 * 60);
    explore.description = Some("Press p on any task to apply a countdown preset.".into());
    explore.tags = vec!["intro".into()];
    explore.checklist = vec![ChecklistItem {
        label: "Start and pause a countdown".into(),
        done: true,
    }];
    explore.due = Some(Local::now().date_naive());
    explore.remaining_seconds = 0;

    Snapshot::new(vec![sketch, review, explore])
}

enum Msg {
    Schedule(Snapshot),
    Shutdown,
}

fn lock(m: &Mutex<Option<String>>) -> MutexGuard<'_, Option<String>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Cheap, cloneable handle the store uses to signal that a flush is owed.
#[derive(Clone)]
pub struct FlushHandle {
    tx: Sender<Msg>,
    last_error: Arc<Mutex<Option<String>>>,
    flushes: Arc<AtomicUsize>,
}

impl FlushHandle {
    /// Queue the given snapshot for a debounced write.
    pub fn schedule(&self, snapshot: Snapshot) {
        // A closed channel means the worker is gone; we are shutting down.
        let _ = self.tx.send(Msg::Schedule(snapshot));
    }

    /// The most recent write failure, cleared by the next successful write.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Number of snapshots that have physically reached disk.
    pub fn completed_flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    /// A handle connected to nothing; scheduled snapshots are dropped.
    pub fn detached() -> FlushHandle {
        let (tx, _rx) = mpsc::channel();
        FlushHandle {
            tx,
            last_error: Arc::new(Mutex::new(None)),
            flushes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Owns the flush worker thread. Dropping it (or calling `shutdown`) forces
/// a final write of any pending snapshot before the thread exits.
pub struct FlushScheduler {
    handle: FlushHandle,
    worker: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    pub fn spawn(path: PathBuf, window: Duration) -> FlushScheduler {
        let (tx, rx) = mpsc::channel();
        let last_error = Arc::new(Mutex::new(None));
        let flushes = Arc::new(AtomicUsize::new(0));
        let worker = Worker {
            rx,
            path,
            window,
            last_error: Arc::clone(&last_error),
            flushes: Arc::clone(&flushes),
            pending: None,
            deadline: None,
        };
        let joiner = thread::spawn(move || worker.run());
        FlushScheduler {
            handle: FlushHandle {
                tx,
                last_error,
                flushes,
            },
            worker: Some(joiner),
        }
    }

    pub fn handle(&self) -> FlushHandle {
        self.handle.clone()
    }

    /// Force the final flush and wait for the worker to finish.
    pub fn shutdown(self) {
        // Drop does the work; the name exists so call sites read as intent.
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        let _ = self.handle.tx.send(Msg::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct Worker {
    rx: Receiver<Msg>,
    path: PathBuf,
    window: Duration,
    last_error: Arc<Mutex<Option<String>>>,
    flushes: Arc<AtomicUsize>,
    pending: Option<Snapshot>,
    deadline: Option<Instant>,
}

impl Worker {
    fn run(mut self) {
        loop {
            let msg = match self.deadline {
                None => match self.rx.recv() {
                    Ok(msg) => msg,
                    Err(_) => break,
                },
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.flush_pending();
                        continue;
                    }
                    match self.rx.recv_timeout(deadline - now) {
                        Ok(msg) => msg,
                        Err(RecvTimeoutError::Timeout) => {
                            self.flush_pending();
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            };
            match msg {
                Msg::Schedule(snapshot) => {
                    self.pending = Some(snapshot);
                    // Anchor at the first change after a flush, not the
                    // latest, so continuous mutation still writes once per
                    // window.
                    if self.deadline.is_none() {
                        self.deadline = Some(Instant::now() + self.window);
                    }
                }
                Msg::Shutdown => break,
            }
        }
        // An unflushed final edit would be data loss.
        self.flush_pending();
    }

    fn flush_pending(&mut self) {
        let Some(snapshot) = self.pending.take() else {
            self.deadline = None;
            return;
        };
        match save(&snapshot, &self.path) {
            Ok(()) => {
                self.deadline = None;
                self.flushes.fetch_add(1, Ordering::SeqCst);
                *lock(&self.last_error) = None;
            }
            Err(e) => {
                warn!("flush to {} failed: {e}; keeping state for retry", self.path.display());
                *lock(&self.last_error) = Some(e.to_string());
                self.pending = Some(snapshot);
                self.deadline = Some(Instant::now() + self.window);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn sample_snapshot() -> Snapshot {
        let mut a = Task::new("alpha".into(), "backlog".into(), 300);
        a.tags = vec!["one".into(), "two".into()];
        a.due = NaiveDate::from_ymd_opt(2027, 1, 15);
        a.checklist = vec![
            ChecklistItem {
                label: "done bit".into(),
                done: true,
            },
            ChecklistItem::new("open bit"),
        ];
        a.remaining_seconds = 120;
        a.timer_running = true;
        let b = Task::new("beta".into(), "done".into(), 600);
        Snapshot::new(vec![a, b])
    }

    #[test]
    fn save_then_load_round_trips_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let snapshot = sample_snapshot();
        save(&snapshot, &path).unwrap();
        assert_eq!(load(&path), snapshot);
    }

    #[test]
    fn missing_file_seeds_sample_tasks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deeper").join("tasks.json");
        let snapshot = load(&path);
        assert!(!snapshot.tasks.is_empty());
        assert!(path.exists());
        // The seeded file parses back to the same snapshot.
        assert_eq!(load(&path), snapshot);
    }

    #[test]
    fn corrupt_file_is_backed_up_and_reseeded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{definitely not json").unwrap();

        let snapshot = load(&path);
        assert!(!snapshot.tasks.is_empty());

        let backups: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "bak"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            fs::read_to_string(&backups[0]).unwrap(),
            "{definitely not json"
        );
        // The data file itself now parses.
        assert_eq!(load(&path), snapshot);
    }

    #[test]
    fn repeated_corruption_never_overwrites_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        for round in 0..2 {
            fs::write(&path, format!("broken #{round}")).unwrap();
            load(&path);
        }
        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.path().extension().is_some_and(|ext| ext == "bak")
            })
            .count();
        assert_eq!(backups, 2);
    }

    #[test]
    fn debounce_coalesces_rapid_schedules_into_one_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let scheduler = FlushScheduler::spawn(path.clone(), Duration::from_millis(100));
        let handle = scheduler.handle();

        let snapshots: Vec<Snapshot> = (0..5)
            .map(|n| Snapshot::new(vec![Task::new(format!("task {n}"), "backlog".into(), 60)]))
            .collect();
        for snapshot in &snapshots {
            handle.schedule(snapshot.clone());
        }
        assert_eq!(handle.completed_flushes(), 0);

        thread::sleep(Duration::from_millis(500));
        assert_eq!(handle.completed_flushes(), 1);
        // The single write carries the latest scheduled snapshot.
        assert_eq!(load(&path), snapshots[4]);
        scheduler.shutdown();
    }

    #[test]
    fn shutdown_forces_pending_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        let scheduler = FlushScheduler::spawn(path.clone(), Duration::from_secs(60));
        let handle = scheduler.handle();

        let snapshot = sample_snapshot();
        handle.schedule(snapshot.clone());
        scheduler.shutdown();

        assert_eq!(handle.completed_flushes(), 1);
        assert_eq!(load(&path), snapshot);
    }

    #[test]
    fn failed_writes_surface_without_losing_state() {
        let dir = tempdir().unwrap();
        // A file where a directory is needed makes every write fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "in the way").unwrap();
        let path = blocker.join("tasks.json");

        let scheduler = FlushScheduler::spawn(path, Duration::from_millis(50));
        let handle = scheduler.handle();
        handle.schedule(sample_snapshot());
        thread::sleep(Duration::from_millis(300));

        assert_eq!(handle.completed_flushes(), 0);
        assert!(handle.last_error().is_some());
        scheduler.shutdown();
    }

    #[test]
    fn save_reports_write_errors() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "in the way").unwrap();
        let err = save(&sample_snapshot(), &blocker.join("tasks.json")).unwrap_err();
        assert!(matches!(err, Error::Write(_)));
    }
}
