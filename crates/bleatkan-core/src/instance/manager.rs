//! Instance discovery.
//!
//! Watches the veadotube instances directory and keeps the set of live
//! instances. Three tasks run per manager:
//!
//! - the directory watcher reads descriptor files as they are created or
//!   modified and updates the map;
//! - the stale sweep removes instances whose descriptor has not been
//!   refreshed within the read timeout;
//! - the dispatcher delivers lifecycle events to the listener.
//!
//! Every map change queues its event while the map lock is held, so the
//! listener sees start, change and end in the order the map changed.
//!
//! Deleted descriptor files are ignored; an instance ends when its file
//! stops being refreshed.

use super::{Instance, InstanceId, VtInstance};
use crate::callback;
use crate::cancel::CancellationToken;
use crate::config::{DiscoveryConfig, DiscoveryOptions};
use crate::error::{BleatError, Result};
use crate::time::unix_time_seconds;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Receives instance lifecycle events.
///
/// Callbacks run one at a time on the discovery dispatcher task; keep them
/// short.
pub trait InstancesListener: Send + Sync + 'static {
    /// A new instance appeared.
    fn on_instance_start(&self, instance: &Instance);

    /// An instance changed its name or server.
    fn on_instance_change(&self, new: &Instance, old: &Instance);

    /// An instance went away.
    fn on_instance_end(&self, id: &InstanceId);
}

/// Default per-user instances directory, `~/.veadotube/instances`.
pub fn instances_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| BleatError::Io {
        message: "Could not determine home directory".to_string(),
        path: None,
        source: None,
    })?;
    Ok(home.join(DiscoveryConfig::INSTANCES_DIR))
}

/// Delay before the next watcher round.
///
/// `target - elapsed`, clamped to `[floor, target]`, doubled when the round
/// found nothing.
pub fn watcher_delay(elapsed: Duration, files_found: bool, floor: Duration, target: Duration) -> Duration {
    let delay = target.saturating_sub(elapsed).clamp(floor, target.max(floor));
    if files_found {
        delay
    } else {
        delay * 2
    }
}

#[derive(Debug)]
enum LifecycleEvent {
    Start(Instance),
    Change { new: Instance, old: Instance },
    End(InstanceId),
    /// Last event after shutdown; ends the dispatcher.
    Stopped,
}

struct Shared {
    instances: Mutex<HashMap<InstanceId, Instance>>,
    /// Filename to parsed ID, so stable filenames are parsed once.
    /// Lock after `instances` when both are needed.
    file_ids: Mutex<HashMap<String, InstanceId>>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    token: CancellationToken,
    options: DiscoveryOptions,
}

impl Shared {
    fn new(options: DiscoveryOptions, token: CancellationToken) -> (Self, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let shared = Self {
            instances: Mutex::new(HashMap::new()),
            file_ids: Mutex::new(HashMap::new()),
            events,
            token,
            options,
        };
        (shared, rx)
    }

    fn instances(&self) -> MutexGuard<'_, HashMap<InstanceId, Instance>> {
        self.instances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an event. Callers hold the `instances` lock.
    fn queue(&self, event: LifecycleEvent) {
        if self.events.send(event).is_err() {
            trace!("Event dispatcher already stopped");
        }
    }

    fn instance_id_for(&self, filename: &str) -> Result<InstanceId> {
        let mut memo = self.file_ids.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = memo.get(filename) {
            return Ok(id.clone());
        }
        let id = InstanceId::parse(filename)?;
        memo.insert(filename.to_string(), id.clone());
        Ok(id)
    }

    fn forget_files(&self, ended: &[InstanceId]) {
        if ended.is_empty() {
            return;
        }
        self.file_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, id| !ended.contains(id));
    }

    /// Read one descriptor file and update the map.
    async fn process_file(&self, path: &Path) {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        trace!("Processing descriptor {}", filename);

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Could not read descriptor {}: {}", filename, e);
                return;
            }
        };

        // Partially written files are common; the next modify event retries.
        let record = match VtInstance::parse(&contents, unix_time_seconds(), self.options.read_timeout_secs) {
            Ok(record) => record,
            Err(e) => {
                debug!("Skipping descriptor {}: {}", filename, e);
                return;
            }
        };

        match self.instance_id_for(filename) {
            Ok(id) => self.apply(id, record),
            Err(e) => debug!("Skipping descriptor {}: {}", filename, e),
        }
    }

    fn apply(&self, id: InstanceId, record: VtInstance) {
        let mut instances = self.instances();
        // The final end events may already be queued.
        if self.token.is_cancelled() {
            return;
        }
        match instances.entry(id) {
            Entry::Vacant(slot) => match Instance::new(slot.key().clone(), record.name, record.server) {
                Ok(instance) => {
                    let instance = instance.with_last_seen(record.time);
                    slot.insert(instance.clone());
                    self.queue(LifecycleEvent::Start(instance));
                }
                Err(e) => debug!("Skipping instance {}: {}", slot.key(), e),
            },
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.name() == record.name && existing.server() == record.server {
                    existing.touch(record.time);
                    return;
                }
                match Instance::new(slot.key().clone(), record.name, record.server) {
                    Ok(new) => {
                        let new = new.with_last_seen(record.time);
                        let old = slot.insert(new.clone());
                        self.queue(LifecycleEvent::Change { new, old });
                    }
                    Err(e) => debug!("Skipping update of {}: {}", slot.key(), e),
                }
            }
        }
    }

    fn mark_failed(&self, id: &InstanceId) -> bool {
        let removed = {
            let mut instances = self.instances();
            let removed = instances.remove(id).is_some();
            if removed {
                self.queue(LifecycleEvent::End(id.clone()));
            }
            removed
        };
        if removed {
            self.forget_files(std::slice::from_ref(id));
        }
        removed
    }

    fn remove_stale(&self, now: i64) -> Vec<InstanceId> {
        let cutoff = now - self.options.read_timeout_secs;
        let mut ended = Vec::new();
        {
            let mut instances = self.instances();
            instances.retain(|id, instance| {
                let live = instance.last_seen_unix_seconds() >= cutoff;
                if !live {
                    ended.push(id.clone());
                }
                live
            });
            for id in &ended {
                self.queue(LifecycleEvent::End(id.clone()));
            }
        }
        self.forget_files(&ended);
        ended
    }

    /// End every remaining instance and stop the dispatcher. The token must
    /// already be cancelled so nothing is added afterwards.
    fn end_all(&self) {
        let ended: Vec<InstanceId> = {
            let mut instances = self.instances();
            let ended: Vec<InstanceId> = instances.drain().map(|(id, _)| id).collect();
            for id in &ended {
                self.queue(LifecycleEvent::End(id.clone()));
            }
            self.queue(LifecycleEvent::Stopped);
            ended
        };
        self.forget_files(&ended);
    }
}

/// Discovers veadotube instances from their descriptor files.
///
/// Dropping the manager stops its tasks.
pub struct InstancesManager {
    directory: PathBuf,
    shared: Arc<Shared>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl InstancesManager {
    /// Start watching with default options.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(listener: Arc<dyn InstancesListener>) -> Result<Self> {
        Self::with_options(listener, DiscoveryOptions::default())
    }

    /// Start watching with custom options.
    ///
    /// The directory is created and watched by the watcher task; if that
    /// fails the error is logged and the manager stops.
    pub fn with_options(listener: Arc<dyn InstancesListener>, options: DiscoveryOptions) -> Result<Self> {
        let directory = match &options.directory {
            Some(dir) => dir.clone(),
            None => instances_dir()?,
        };

        let token = CancellationToken::new();
        let (shared, events) = Shared::new(options, token.clone());
        let shared = Arc::new(shared);

        let dispatcher_task = tokio::spawn(run_dispatcher(listener, events));
        let watcher_task = tokio::spawn(run_directory_watcher(
            Arc::clone(&shared),
            directory.clone(),
            token.clone(),
        ));
        let sweep_task = tokio::spawn(run_stale_sweep(Arc::clone(&shared), token.clone()));

        Ok(Self {
            directory,
            shared,
            token,
            tasks: Mutex::new(vec![watcher_task, sweep_task, dispatcher_task]),
        })
    }

    /// Directory being watched.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Snapshot of an instance by ID.
    pub fn get_instance(&self, id: &InstanceId) -> Option<Instance> {
        self.shared.instances().get(id).cloned()
    }

    /// Snapshot of every live instance, ordered by ID.
    pub fn instances(&self) -> Vec<Instance> {
        let mut all: Vec<Instance> = self.shared.instances().values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    /// Evict an instance ahead of the stale timeout, e.g. after its
    /// connection ran out of retries. Fires an end event if it was live.
    ///
    /// A later descriptor refresh brings it back as a new instance.
    pub fn mark_instance_failed(&self, id: &InstanceId) -> bool {
        debug!("Marking instance {} as failed", id);
        self.shared.mark_failed(id)
    }

    /// Whether discovery is still running.
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stop discovery. Remaining instances receive end events. Idempotent.
    pub fn close(&self) {
        if self.token.is_cancelled() {
            return;
        }
        debug!("Closing instances manager");
        self.token.cancel();
    }

    /// Stop discovery and wait until every task, including the last end
    /// events, has finished.
    pub async fn shutdown(&self) {
        self.close();
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Discovery task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for InstancesManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_dispatcher(listener: Arc<dyn InstancesListener>, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            LifecycleEvent::Start(instance) => {
                info!("Instance started: {}", instance);
                callback::invoke("on_instance_start", || listener.on_instance_start(&instance));
            }
            LifecycleEvent::Change { new, old } => {
                info!("Instance changed: {} -> {}", old, new);
                callback::invoke("on_instance_change", || listener.on_instance_change(&new, &old));
            }
            LifecycleEvent::End(id) => {
                info!("Instance ended: {}", id);
                callback::invoke("on_instance_end", || listener.on_instance_end(&id));
            }
            LifecycleEvent::Stopped => break,
        }
    }
    trace!("Event dispatcher stopped");
}

fn collect_paths(event: notify::Result<Event>, paths: &mut BTreeSet<PathBuf>) {
    match event {
        Ok(event) => match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => paths.extend(event.paths),
            EventKind::Remove(_) => {
                trace!("Descriptor removed, left to the stale sweep: {:?}", event.paths);
            }
            _ => {}
        },
        Err(e) => debug!("File watcher error: {}", e),
    }
}

async fn scan_directory(directory: &Path) -> BTreeSet<PathBuf> {
    let mut paths = BTreeSet::new();
    let mut entries = match tokio::fs::read_dir(directory).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Could not scan {}: {}", directory.display(), e);
            return paths;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            paths.insert(entry.path());
        }
    }
    paths
}

async fn open_watcher(
    directory: &Path,
    events: mpsc::UnboundedSender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| BleatError::io_at(e, directory))?;
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = events.send(res);
    })?;
    watcher.watch(directory, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

async fn run_directory_watcher(shared: Arc<Shared>, directory: PathBuf, token: CancellationToken) {
    trace!("Directory watcher started");
    let floor = shared.options.loop_delay_min;
    let target = shared.options.loop_delay_max;

    let (event_tx, mut events) = mpsc::unbounded_channel();
    // Dropped with this task, which stops the notify thread.
    let _watcher = match open_watcher(&directory, event_tx).await {
        Ok(watcher) => watcher,
        Err(e) => {
            error!("Cannot watch {}: {}", directory.display(), e);
            token.cancel();
            return;
        }
    };
    info!("Watching veadotube instances in {}", directory.display());

    if shared.options.initial_scan {
        for path in scan_directory(&directory).await {
            shared.process_file(&path).await;
        }
    }

    loop {
        let first = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    warn!("File watcher channel disconnected");
                    break;
                }
            },
        };
        let started = Instant::now();

        let mut paths = BTreeSet::new();
        collect_paths(first, &mut paths);
        while let Ok(event) = events.try_recv() {
            collect_paths(event, &mut paths);
        }

        let files_found = !paths.is_empty();
        for path in paths {
            if token.is_cancelled() {
                break;
            }
            shared.process_file(&path).await;
        }

        let delay = watcher_delay(started.elapsed(), files_found, floor, target);
        trace!("Directory watcher sleeping {:?}", delay);
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    token.cancel();
    trace!("Directory watcher stopped");
}

async fn run_stale_sweep(shared: Arc<Shared>, token: CancellationToken) {
    let interval = shared.options.loop_delay_max;

    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep(interval) => {}
    }

    while !token.is_cancelled() {
        shared.remove_stale(unix_time_seconds());

        let delay = if shared.instances().is_empty() {
            interval * 2
        } else {
            interval
        };
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    token.cancel();
    shared.end_all();
    trace!("Stale sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl InstancesListener for Recorder {
        fn on_instance_start(&self, instance: &Instance) {
            if instance.name() == "panics" {
                panic!("listener bug");
            }
            self.events.lock().unwrap().push(format!("start {}", instance.name()));
        }
        fn on_instance_change(&self, new: &Instance, old: &Instance) {
            self.events
                .lock()
                .unwrap()
                .push(format!("change {} -> {}", old.name(), new.name()));
        }
        fn on_instance_end(&self, id: &InstanceId) {
            self.events.lock().unwrap().push(format!("end {id}"));
        }
    }

    fn shared() -> (Arc<Shared>, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (shared, rx) = Shared::new(DiscoveryOptions::default(), CancellationToken::new());
        (Arc::new(shared), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    const NAME: &str = "mini-08dc8d3c583c0587-00000f38";

    fn id() -> InstanceId {
        InstanceId::parse(NAME).unwrap()
    }

    fn record(time: i64, name: &str, server: &str) -> VtInstance {
        VtInstance {
            time,
            name: name.into(),
            server: server.into(),
        }
    }

    #[test]
    fn test_watcher_delay() {
        let floor = Duration::from_millis(100);
        let target = Duration::from_millis(3000);

        assert_eq!(
            watcher_delay(Duration::from_millis(500), true, floor, target),
            Duration::from_millis(2500)
        );
        assert_eq!(
            watcher_delay(Duration::from_millis(500), false, floor, target),
            Duration::from_millis(5000)
        );
        assert_eq!(watcher_delay(Duration::from_secs(10), true, floor, target), floor);
        assert_eq!(watcher_delay(Duration::ZERO, true, floor, target), target);
    }

    #[test]
    fn test_apply_start_refresh_change() {
        let (shared, mut rx) = shared();

        shared.apply(id(), record(100, "mini", "127.0.0.1:4000"));
        assert!(matches!(&drain(&mut rx)[..], [LifecycleEvent::Start(_)]));

        shared.apply(id(), record(105, "mini", "127.0.0.1:4000"));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(shared.instances()[&id()].last_seen_unix_seconds(), 105);

        shared.apply(id(), record(106, "mini", "127.0.0.1:4001"));
        match &drain(&mut rx)[..] {
            [LifecycleEvent::Change { new, old }] => {
                assert_eq!(old.server(), "127.0.0.1:4000");
                assert_eq!(new.server(), "127.0.0.1:4001");
                assert_eq!(new.last_seen_unix_seconds(), 106);
            }
            other => panic!("expected change, got {other:?}"),
        }
        assert_eq!(shared.instances().len(), 1);
    }

    #[test]
    fn test_remove_stale() {
        let (shared, mut rx) = shared();
        shared.apply(id(), record(100, "mini", "127.0.0.1:4000"));
        drain(&mut rx);

        assert!(shared.remove_stale(110).is_empty());
        assert_eq!(shared.remove_stale(111), vec![id()]);
        assert!(matches!(&drain(&mut rx)[..], [LifecycleEvent::End(ended)] if *ended == id()));
        assert!(shared.remove_stale(200).is_empty());
    }

    #[test]
    fn test_instance_id_memo() {
        let (shared, _rx) = shared();
        assert_eq!(shared.instance_id_for(NAME).unwrap(), id());
        assert!(shared.file_ids.lock().unwrap().contains_key(NAME));
        assert!(shared.instance_id_for("notes.txt").is_err());
    }

    #[test]
    fn test_ended_instances_leave_the_memo() {
        let (shared, _rx) = shared();
        let other = "mini-08dc8d3c583c0588-00000f39";

        for name in [NAME, other] {
            let id = shared.instance_id_for(name).unwrap();
            shared.apply(id, record(100, "mini", "127.0.0.1:4000"));
        }
        assert!(shared.mark_failed(&id()));
        assert!(!shared.file_ids.lock().unwrap().contains_key(NAME));
        assert!(shared.file_ids.lock().unwrap().contains_key(other));

        assert_eq!(shared.remove_stale(200).len(), 1);
        assert!(shared.file_ids.lock().unwrap().is_empty());
    }

    #[test]
    fn test_nothing_added_after_end_all() {
        let (shared, mut rx) = shared();
        shared.apply(id(), record(100, "mini", "127.0.0.1:4000"));

        shared.token.cancel();
        shared.end_all();
        shared.apply(id(), record(101, "mini", "127.0.0.1:4000"));

        assert!(shared.instances().is_empty());
        assert!(shared.file_ids.lock().unwrap().is_empty());
        assert!(matches!(
            &drain(&mut rx)[..],
            [LifecycleEvent::Start(_), LifecycleEvent::End(_), LifecycleEvent::Stopped]
        ));
    }

    #[test]
    fn test_refresh_racing_mark_failed_keeps_event_order() {
        let (shared, mut rx) = shared();

        let refresher = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let server = if i % 3 == 0 { "127.0.0.1:4001" } else { "127.0.0.1:4000" };
                    shared.apply(id(), record(100 + i, "mini", server));
                }
            })
        };
        let failer = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    shared.mark_failed(&id());
                    std::thread::yield_now();
                }
            })
        };
        refresher.join().unwrap();
        failer.join().unwrap();

        let mut live = HashSet::new();
        for event in drain(&mut rx) {
            match event {
                LifecycleEvent::Start(instance) => {
                    assert!(live.insert(instance.id().clone()), "start while live");
                }
                LifecycleEvent::Change { new, .. } => {
                    assert!(live.contains(new.id()), "change while ended");
                }
                LifecycleEvent::End(id) => {
                    assert!(live.remove(&id), "end while not live");
                }
                LifecycleEvent::Stopped => panic!("unexpected stop"),
            }
        }
        let remaining: HashSet<InstanceId> = shared.instances().keys().cloned().collect();
        assert_eq!(live, remaining);
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_in_order_and_survives_panics() {
        let recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        let panics = Instance::new(id(), "panics", "127.0.0.1:4000").unwrap();
        let old = Instance::new(id(), "mini", "127.0.0.1:4000").unwrap();
        let new = Instance::new(id(), "studio", "127.0.0.1:4000").unwrap();

        tx.send(LifecycleEvent::Start(panics)).unwrap();
        tx.send(LifecycleEvent::Start(old.clone())).unwrap();
        tx.send(LifecycleEvent::Change { new, old }).unwrap();
        tx.send(LifecycleEvent::End(id())).unwrap();
        tx.send(LifecycleEvent::Stopped).unwrap();
        tx.send(LifecycleEvent::End(id())).unwrap();

        tokio::time::timeout(Duration::from_secs(5), run_dispatcher(recorder.clone(), rx))
            .await
            .unwrap();

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec![
                "start mini".to_string(),
                "change mini -> studio".to_string(),
                format!("end {NAME}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_process_file_fires_start_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(NAME);
        let body = serde_json::json!({
            "time": unix_time_seconds(),
            "name": "mini",
            "server": "127.0.0.1:4000",
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let (shared, mut rx) = shared();
        shared.process_file(&path).await;
        shared.process_file(&path).await;

        assert!(matches!(&drain(&mut rx)[..], [LifecycleEvent::Start(instance)] if instance.name() == "mini"));
    }

    #[tokio::test]
    async fn test_process_file_skips_bad_names_and_stale_records() {
        let dir = tempfile::tempdir().unwrap();
        let (shared, mut rx) = shared();

        let bad_name = dir.path().join("notes.txt");
        let body = serde_json::json!({
            "time": unix_time_seconds(),
            "name": "mini",
            "server": "127.0.0.1:4000",
        });
        std::fs::write(&bad_name, body.to_string()).unwrap();
        shared.process_file(&bad_name).await;

        let stale = dir.path().join(NAME);
        let body = serde_json::json!({
            "time": unix_time_seconds() - 60,
            "name": "mini",
            "server": "127.0.0.1:4000",
        });
        std::fs::write(&stale, body.to_string()).unwrap();
        shared.process_file(&stale).await;

        assert!(drain(&mut rx).is_empty());
        assert!(shared.instances().is_empty());
    }

    #[tokio::test]
    async fn test_unwatchable_directory_stops_manager() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        });
        let options = DiscoveryOptions::default().with_directory(blocker.join("instances"));
        let manager = InstancesManager::with_options(recorder.clone(), options).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while manager.is_active() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::timeout(Duration::from_secs(5), manager.shutdown())
            .await
            .unwrap();
        assert!(recorder.events.lock().unwrap().is_empty());
    }
}
