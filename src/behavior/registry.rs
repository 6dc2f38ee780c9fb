//! The process-wide, synchronized table of registered behaviors and system settings.

use crate::behavior::matrix::Behavior;
use crate::behavior::settings::SystemSettings;
use crate::err::Error;
use crate::err::ErrorKind;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

/// The well-known name of the root behavior every other behavior ultimately descends from.
pub const DEFAULT_BEHAVIOR: &str = "DEFAULT";

/// The well-known name of the system settings entry applied when no per-cluster entry exists.
pub const DEFAULT_SYSTEM: &str = "DEFAULT";

struct RegistryState {
	behaviors: HashMap<String, Arc<Behavior>>,
	system: HashMap<String, SystemSettings>,
}

impl RegistryState {
	fn bootstrap() -> Self {
		let mut behaviors = HashMap::new();
		behaviors.insert(DEFAULT_BEHAVIOR.to_string(), Arc::new(Behavior::new(DEFAULT_BEHAVIOR, None, Vec::new())));
		let mut system = HashMap::new();
		system.insert(DEFAULT_SYSTEM.to_string(), SystemSettings::baseline());
		RegistryState { behaviors, system }
	}
}

static REGISTRY: Lazy<RwLock<RegistryState>> = Lazy::new(|| RwLock::new(RegistryState::bootstrap()));

/// Looks up a registered behavior by name, falling back to DEFAULT if `name` is not registered.
pub fn lookup(name: &str) -> Arc<Behavior> {
	let state = REGISTRY.read().expect("behavior registry poisoned");
	state.behaviors.get(name).or_else(|| state.behaviors.get(DEFAULT_BEHAVIOR)).expect("DEFAULT is always registered").clone()
}

/// Looks up system settings by cluster name, falling back to the DEFAULT entry.
pub fn lookup_system(name: &str) -> SystemSettings {
	let state = REGISTRY.read().expect("behavior registry poisoned");
	state.system.get(name).or_else(|| state.system.get(DEFAULT_SYSTEM)).copied().expect("DEFAULT system settings are always registered")
}

/// Atomically replaces the entire set of registered behaviors and system settings, e.g. after a
/// configuration hot-reload. `behaviors` must include an entry named `DEFAULT`.
pub fn swap(behaviors: HashMap<String, Arc<Behavior>>, system: HashMap<String, SystemSettings>) -> Result<(), Error> {
	if !behaviors.contains_key(DEFAULT_BEHAVIOR) {
		return Err(ErrorKind::ConfigError.with_message("configuration document is missing the DEFAULT behavior"));
	}
	let mut state = REGISTRY.write().expect("behavior registry poisoned");
	state.behaviors = behaviors;
	state.system = system;
	Ok(())
}

/// Registers or replaces a single behavior, leaving every other registered behavior untouched.
/// Primarily useful in tests and for programmatic (non-config-file) setup.
pub fn register(behavior: Behavior) {
	let mut state = REGISTRY.write().expect("behavior registry poisoned");
	state.behaviors.insert(behavior.name.clone(), Arc::new(behavior));
}

/// The names of every currently registered behavior.
pub fn registered_names() -> Vec<String> {
	REGISTRY.read().expect("behavior registry poisoned").behaviors.keys().cloned().collect()
}

/// Serializes tests that mutate the process-wide registry (`register`/`swap`); cargo runs tests
/// in one process across threads, and this registry is, by design, global mutable state.
#[cfg(test)]
pub(crate) static TEST_SERIAL: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
	use super::*;
	use crate::behavior::patch::PatchBuilder;
	use crate::behavior::selector::Selector;

	#[test]
	fn default_is_registered_from_the_start() {
		let _guard = TEST_SERIAL.lock().unwrap();
		let default = lookup(DEFAULT_BEHAVIOR);
		assert_eq!(default.name, DEFAULT_BEHAVIOR);
	}

	#[test]
	fn unknown_name_falls_back_to_default() {
		let _guard = TEST_SERIAL.lock().unwrap();
		let fallback = lookup("definitely-not-registered-xyz");
		assert_eq!(fallback.name, DEFAULT_BEHAVIOR);
	}

	#[test]
	fn register_then_lookup_round_trips() {
		let _guard = TEST_SERIAL.lock().unwrap();
		let default = lookup(DEFAULT_BEHAVIOR);
		let custom = Behavior::new("custom-test-behavior", Some(default), vec![PatchBuilder::new(Selector::All).send_key(true).build()]);
		register(custom);
		let looked_up = lookup("custom-test-behavior");
		assert_eq!(looked_up.name, "custom-test-behavior");
	}
}
