//! Hot-reload of the configuration document: a background thread watches the source file and
//! atomically swaps freshly parsed behaviors into the registry.

use crate::behavior::config::load_from_path;
use crate::behavior::registry;
use crate::err::Error;
use notify::Config;
use notify::Event;
use notify::EventKind;
use notify::RecommendedWatcher;
use notify::RecursiveMode;
use notify::Watcher;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;
use tracing::error;
use tracing::info;
use tracing::warn;

/// The minimum poll interval the watcher will accept; the configuration format requires >= 500ms.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Watches a configuration file for modifications and keeps the behavior registry current.
///
/// Owns its background thread exclusively: dropping (or calling [`ConfigWatcher::shutdown`])
/// stops the thread and releases the underlying file handle.
pub struct ConfigWatcher {
	stop: Arc<AtomicBool>,
	handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ConfigWatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ConfigWatcher").field("running", &!self.stop.load(Ordering::SeqCst)).finish()
	}
}

impl ConfigWatcher {
	/// Starts watching `path`, applying it once immediately, then reloading and swapping the
	/// registry on every detected modification. `poll_interval` is clamped up to
	/// [`MIN_POLL_INTERVAL`].
	pub fn start(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<ConfigWatcher, Error> {
		let path = path.into();
		let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
		let stop = Arc::new(AtomicBool::new(false));
		let thread_stop = stop.clone();
		let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
		let config = Config::default().with_poll_interval(poll_interval);
		let mut watcher = RecommendedWatcher::new(tx, config)?;
		watcher.watch(&path, RecursiveMode::NonRecursive)?;
		reload(&path);
		let handle = std::thread::spawn(move || {
			// Moving `watcher` into the loop keeps its OS resources (inotify fd, poll thread)
			// alive for exactly as long as the loop runs.
			let _watcher = watcher;
			run(&path, rx, thread_stop, poll_interval);
		});
		Ok(ConfigWatcher { stop, handle: Some(handle) })
	}

	/// Stops the watcher and blocks until its background thread exits.
	pub fn shutdown(self) {
		// Drop performs the same steps; this exists so callers can wait for the join
		// explicitly instead of relying on scope exit.
		drop(self);
	}
}

impl Drop for ConfigWatcher {
	fn drop(&mut self) {
		self.stop.store(true, Ordering::SeqCst);
		if let Some(handle) = self.handle.take() {
			let _ = handle.join();
		}
	}
}

fn run(path: &Path, rx: mpsc::Receiver<notify::Result<Event>>, stop: Arc<AtomicBool>, poll_interval: Duration) {
	let mut last_event: Option<Instant> = None;
	loop {
		if stop.load(Ordering::SeqCst) {
			return;
		}
		match rx.recv_timeout(Duration::from_millis(100)) {
			Ok(Ok(event)) if is_relevant(&event) => last_event = Some(Instant::now()),
			Ok(Ok(_)) => {}
			Ok(Err(err)) => warn!(error = %err, "configuration watcher observed an I/O error"),
			Err(mpsc::RecvTimeoutError::Timeout) => {}
			Err(mpsc::RecvTimeoutError::Disconnected) => return,
		}
		if let Some(at) = last_event {
			if at.elapsed() >= poll_interval {
				reload(path);
				last_event = None;
			}
		}
	}
}

fn is_relevant(event: &Event) -> bool {
	matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_))
}

fn reload(path: &Path) {
	match load_from_path(path) {
		Ok((behaviors, system)) => match registry::swap(behaviors, system) {
			Ok(()) => info!(path = %path.display(), "reloaded configuration"),
			Err(err) => {
				error!(path = %path.display(), error = %err, "reloaded configuration failed validation, keeping previous registry")
			}
		},
		Err(err) => error!(path = %path.display(), error = %err, "failed to reload configuration, keeping previous registry"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::behavior::selector::Mode;
	use crate::behavior::selector::OpKind;
	use crate::behavior::selector::OpShape;
	use crate::behavior::selector::Triple;
	use std::fs;

	#[test]
	fn reload_picks_up_a_modified_file() {
		let _guard = registry::TEST_SERIAL.lock().unwrap();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("behaviors.toml");
		fs::write(
			&path,
			r#"
				[behaviors.DEFAULT]
				[behaviors."watch-test"]
				parent = "DEFAULT"
				[behaviors."watch-test".reads]
				max_attempts = 2
			"#,
		)
		.unwrap();

		let watcher = ConfigWatcher::start(&path, MIN_POLL_INTERVAL).unwrap();
		let triple = Triple::new(OpKind::Read, OpShape::Point, Mode::Ap);
		assert_eq!(registry::lookup("watch-test").resolve(triple).max_attempts, 2);

		fs::write(
			&path,
			r#"
				[behaviors.DEFAULT]
				[behaviors."watch-test"]
				parent = "DEFAULT"
				[behaviors."watch-test".reads]
				max_attempts = 9
			"#,
		)
		.unwrap();

		let deadline = Instant::now() + Duration::from_secs(5);
		let mut observed = 0;
		while Instant::now() < deadline {
			observed = registry::lookup("watch-test").resolve(triple).max_attempts;
			if observed == 9 {
				break;
			}
			std::thread::sleep(Duration::from_millis(100));
		}
		assert_eq!(observed, 9, "expected the watcher to reload the modified file");
		watcher.shutdown();
	}
}
