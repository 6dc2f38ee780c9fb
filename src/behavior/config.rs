//! The text configuration format: parses behaviors and system settings, resolves parent
//! references, and builds the `Behavior` forest the registry serves from.

use crate::behavior::matrix::Behavior;
use crate::behavior::patch::Patch;
use crate::behavior::patch::PatchBuilder;
use crate::behavior::registry::DEFAULT_BEHAVIOR;
use crate::behavior::registry::DEFAULT_SYSTEM;
use crate::behavior::selector::Selector;
use crate::behavior::settings::CommitLevel;
use crate::behavior::settings::ConsistencyAp;
use crate::behavior::settings::ConsistencyCp;
use crate::behavior::settings::PartialSystemSettings;
use crate::behavior::settings::ReplicaOrder;
use crate::behavior::settings::SystemSettings;
use crate::err::Error;
use crate::err::ErrorKind;
use serde::Deserialize;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use toml::Value;

#[derive(Deserialize)]
struct ConfigDocument {
	#[serde(default)]
	behaviors: HashMap<String, Value>,
	#[serde(default)]
	system: HashMap<String, Value>,
}

struct RawBehavior {
	parent: Option<String>,
	patches: Vec<Patch>,
}

/// Parses `text` as a configuration document and resolves it into a ready-to-register forest of
/// behaviors plus a per-name map of system settings. Does not touch the registry; callers pass
/// the result to [`crate::behavior::registry::swap`].
pub fn load_from_str(text: &str) -> Result<(HashMap<String, Arc<Behavior>>, HashMap<String, SystemSettings>), Error> {
	let doc: ConfigDocument = toml::from_str(text)?;
	let raw = parse_behaviors(&doc.behaviors)?;
	let behaviors = resolve_behaviors(raw)?;
	let system = parse_system(&doc.system)?;
	Ok((behaviors, system))
}

/// Reads and parses a configuration document from `path`.
pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<(HashMap<String, Arc<Behavior>>, HashMap<String, SystemSettings>), Error> {
	let text = std::fs::read_to_string(path)?;
	load_from_str(&text)
}

fn parse_behaviors(table: &HashMap<String, Value>) -> Result<HashMap<String, RawBehavior>, Error> {
	let mut out = HashMap::new();
	for (name, value) in table {
		let entry = value.as_table().ok_or_else(|| ErrorKind::ConfigError.with_context(format!("behavior `{name}` is not a table")))?;
		let parent = match entry.get("parent") {
			Some(Value::String(s)) => Some(s.clone()),
			Some(other) => return Err(ErrorKind::ConfigError.with_context(format!("behavior `{name}`'s parent must be a string, got {other}"))),
			None => None,
		};
		let mut selector_keys: Vec<&String> = entry.keys().filter(|k| *k != "parent").collect();
		selector_keys.sort();
		let mut patches = Vec::with_capacity(selector_keys.len());
		for key in selector_keys {
			let selector = Selector::from_config_key(key)
				.ok_or_else(|| ErrorKind::ConfigError.with_context(format!("behavior `{name}` uses unrecognized selector `{key}`")))?;
			let fields = entry
				.get(key)
				.and_then(Value::as_table)
				.ok_or_else(|| ErrorKind::ConfigError.with_context(format!("behavior `{name}`.{key} must be a table")))?;
			patches.push(parse_patch(selector, fields)?);
		}
		out.insert(name.clone(), RawBehavior { parent, patches });
	}
	Ok(out)
}

fn parse_patch(selector: Selector, fields: &toml::value::Table) -> Result<Patch, Error> {
	let mut builder = PatchBuilder::new(selector);
	for (key, value) in fields {
		builder = apply_field_from_toml(builder, key, value)?;
	}
	Ok(builder.build())
}

fn apply_field_from_toml(builder: PatchBuilder, key: &str, value: &Value) -> Result<PatchBuilder, Error> {
	let bad = |expected: &str| ErrorKind::ConfigError.with_context(format!("field `{key}` expected {expected}, got {value}"));
	Ok(match key {
		"timeout_per_attempt" => builder.timeout_per_attempt(duration_field(key, value)?),
		"timeout_total" => builder.timeout_total(duration_field(key, value)?),
		"timeout_connect" => builder.timeout_connect(duration_field(key, value)?),
		"timeout_post_fail" => builder.timeout_post_fail(duration_field(key, value)?),
		"max_attempts" => builder.max_attempts(u32_field(key, value)?),
		"retry_backoff" => builder.retry_backoff(duration_field(key, value)?),
		"replica_order" => builder.replica_order(replica_order(value.as_str().ok_or_else(|| bad("a string"))?)?),
		"send_key" => builder.send_key(value.as_bool().ok_or_else(|| bad("a bool"))?),
		"compression" => builder.compression(value.as_bool().ok_or_else(|| bad("a bool"))?),
		"durable_delete" => builder.durable_delete(value.as_bool().ok_or_else(|| bad("a bool"))?),
		"commit_level" => builder.commit_level(commit_level(value.as_str().ok_or_else(|| bad("a string"))?)?),
		"read_consistency_ap" => builder.read_consistency_ap(consistency_ap(value.as_str().ok_or_else(|| bad("a string"))?)?),
		"read_consistency_cp" => builder.read_consistency_cp(consistency_cp(value.as_str().ok_or_else(|| bad("a string"))?)?),
		"touch_ttl_percent" => builder.touch_ttl_percent(u32_field(key, value)?),
		"batch_concurrency" => builder.batch_concurrency(u32_field(key, value)?),
		"batch_allow_inline" => builder.batch_allow_inline(value.as_bool().ok_or_else(|| bad("a bool"))?),
		"batch_allow_inline_ssd" => builder.batch_allow_inline_ssd(value.as_bool().ok_or_else(|| bad("a bool"))?),
		"query_queue_size" => builder.query_queue_size(u32_field(key, value)?),
		other => return Err(ErrorKind::ConfigError.with_context(format!("unrecognized settings field `{other}`"))),
	})
}

fn u32_field(key: &str, value: &Value) -> Result<u32, Error> {
	value
		.as_integer()
		.and_then(|i| u32::try_from(i).ok())
		.ok_or_else(|| ErrorKind::ConfigError.with_context(format!("field `{key}` expected a non-negative integer, got {value}")))
}

fn duration_field(key: &str, value: &Value) -> Result<Duration, Error> {
	let raw = value.as_str().ok_or_else(|| ErrorKind::ConfigError.with_context(format!("field `{key}` expected a duration string, got {value}")))?;
	parse_duration(raw)
}

fn replica_order(raw: &str) -> Result<ReplicaOrder, Error> {
	match raw {
		"master" => Ok(ReplicaOrder::Master),
		"master_proles" => Ok(ReplicaOrder::MasterProles),
		"sequence" => Ok(ReplicaOrder::Sequence),
		"random" => Ok(ReplicaOrder::Random),
		other => Err(ErrorKind::ConfigError.with_context(format!("unrecognized replica_order `{other}`"))),
	}
}

fn commit_level(raw: &str) -> Result<CommitLevel, Error> {
	match raw {
		"commit_all" => Ok(CommitLevel::CommitAll),
		"commit_master" => Ok(CommitLevel::CommitMaster),
		other => Err(ErrorKind::ConfigError.with_context(format!("unrecognized commit_level `{other}`"))),
	}
}

fn consistency_ap(raw: &str) -> Result<ConsistencyAp, Error> {
	match raw {
		"one" => Ok(ConsistencyAp::One),
		"all" => Ok(ConsistencyAp::All),
		other => Err(ErrorKind::ConfigError.with_context(format!("unrecognized read_consistency_ap `{other}`"))),
	}
}

fn consistency_cp(raw: &str) -> Result<ConsistencyCp, Error> {
	match raw {
		"linearize" => Ok(ConsistencyCp::Linearize),
		"allow_replica" => Ok(ConsistencyCp::AllowReplica),
		other => Err(ErrorKind::ConfigError.with_context(format!("unrecognized read_consistency_cp `{other}`"))),
	}
}

/// Parses a duration string of the form `<integer>[whitespace]<unit>`, where unit is one of
/// `ns`, `us`, `ms`, `s`, `m`, `h`, `d`.
pub fn parse_duration(raw: &str) -> Result<Duration, Error> {
	let trimmed = raw.trim();
	let split_at = trimmed.find(|c: char| !c.is_ascii_digit()).ok_or_else(|| {
		ErrorKind::ConfigError.with_context(format!("duration `{raw}` is missing a unit suffix"))
	})?;
	let (number, rest) = trimmed.split_at(split_at);
	let unit = rest.trim_start();
	let amount: u64 = number
		.parse()
		.map_err(|_| ErrorKind::ConfigError.with_context(format!("duration `{raw}` has a non-integer magnitude")))?;
	let duration = match unit {
		"ns" => Duration::from_nanos(amount),
		"us" => Duration::from_micros(amount),
		"ms" => Duration::from_millis(amount),
		"s" => Duration::from_secs(amount),
		"m" => Duration::from_secs(amount * 60),
		"h" => Duration::from_secs(amount * 3_600),
		"d" => Duration::from_secs(amount * 86_400),
		other => return Err(ErrorKind::ConfigError.with_context(format!("duration `{raw}` has unrecognized unit `{other}`"))),
	};
	Ok(duration)
}

fn resolve_behaviors(raw: HashMap<String, RawBehavior>) -> Result<HashMap<String, Arc<Behavior>>, Error> {
	let mut built: HashMap<String, Arc<Behavior>> = HashMap::new();
	let names: Vec<String> = raw.keys().cloned().collect();
	for name in names {
		if !built.contains_key(&name) {
			let mut stack = HashSet::new();
			resolve_one(&name, &raw, &mut built, &mut stack)?;
		}
	}
	if !built.contains_key(DEFAULT_BEHAVIOR) {
		built.insert(DEFAULT_BEHAVIOR.to_string(), Arc::new(Behavior::new(DEFAULT_BEHAVIOR, None, Vec::new())));
	}
	Ok(built)
}

fn resolve_one(
	name: &str,
	raw: &HashMap<String, RawBehavior>,
	built: &mut HashMap<String, Arc<Behavior>>,
	stack: &mut HashSet<String>,
) -> Result<Arc<Behavior>, Error> {
	if let Some(existing) = built.get(name) {
		return Ok(existing.clone());
	}
	if !stack.insert(name.to_string()) {
		return Err(ErrorKind::ConfigError.with_context(format!("cyclic parent chain involving `{name}`")));
	}
	let entry = match raw.get(name) {
		Some(entry) => entry,
		None if name == DEFAULT_BEHAVIOR => {
			let default = Arc::new(Behavior::new(DEFAULT_BEHAVIOR, None, Vec::new()));
			built.insert(name.to_string(), default.clone());
			stack.remove(name);
			return Ok(default);
		}
		None => return Err(ErrorKind::ConfigError.with_context(format!("unknown parent `{name}`"))),
	};
	let parent = if name == DEFAULT_BEHAVIOR {
		None
	} else {
		let parent_name = entry.parent.clone().unwrap_or_else(|| DEFAULT_BEHAVIOR.to_string());
		Some(resolve_one(&parent_name, raw, built, stack)?)
	};
	stack.remove(name);
	let behavior = Arc::new(Behavior::new(name, parent, entry.patches.clone()));
	built.insert(name.to_string(), behavior.clone());
	Ok(behavior)
}

fn parse_system(table: &HashMap<String, Value>) -> Result<HashMap<String, SystemSettings>, Error> {
	let mut out = HashMap::new();
	let default = SystemSettings::baseline();
	if let Some(value) = table.get(DEFAULT_SYSTEM) {
		let partial = parse_partial_system(value)?;
		out.insert(DEFAULT_SYSTEM.to_string(), SystemSettings::merge(default, partial));
	} else {
		out.insert(DEFAULT_SYSTEM.to_string(), default);
	}
	let resolved_default = out[DEFAULT_SYSTEM];
	for (name, value) in table {
		if name == DEFAULT_SYSTEM {
			continue;
		}
		let partial = parse_partial_system(value)?;
		out.insert(name.clone(), SystemSettings::merge(resolved_default, partial));
	}
	Ok(out)
}

fn parse_partial_system(value: &Value) -> Result<PartialSystemSettings, Error> {
	let table = value.as_table().ok_or_else(|| ErrorKind::ConfigError.with_message("system entry must be a table"))?;
	let mut partial = PartialSystemSettings::default();
	if let Some(connections) = table.get("connections").and_then(Value::as_table) {
		if let Some(v) = connections.get("minimum_connections_per_node") {
			partial.minimum_connections_per_node = Some(u32_field("minimum_connections_per_node", v)?);
		}
		if let Some(v) = connections.get("maximum_connections_per_node") {
			partial.maximum_connections_per_node = Some(u32_field("maximum_connections_per_node", v)?);
		}
		if let Some(v) = connections.get("maximum_socket_idle_time") {
			partial.maximum_socket_idle_time = Some(duration_field("maximum_socket_idle_time", v)?);
		}
	}
	if let Some(breaker) = table.get("circuit_breaker").and_then(Value::as_table) {
		if let Some(v) = breaker.get("num_tend_intervals_in_error_window") {
			partial.num_tend_intervals_in_error_window = Some(u32_field("num_tend_intervals_in_error_window", v)?);
		}
		if let Some(v) = breaker.get("maximum_errors_in_error_window") {
			partial.maximum_errors_in_error_window = Some(u32_field("maximum_errors_in_error_window", v)?);
		}
	}
	if let Some(refresh) = table.get("refresh").and_then(Value::as_table) {
		if let Some(v) = refresh.get("tend_interval") {
			partial.tend_interval = Some(duration_field("tend_interval", v)?);
		}
	}
	Ok(partial)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::behavior::selector::Mode;
	use crate::behavior::selector::OpKind;
	use crate::behavior::selector::OpShape;
	use crate::behavior::selector::Triple;

	const DOC: &str = r#"
		[behaviors.DEFAULT]

		[behaviors.aggressive]
		parent = "DEFAULT"

		[behaviors.aggressive.reads]
		max_attempts = 5
		timeout_per_attempt = "500ms"

		[behaviors.aggressive."reads.batch.ap"]
	"#;

	#[test]
	fn two_pass_resolution_builds_inheriting_behaviors() {
		let (behaviors, _system) = load_from_str(DOC).unwrap();
		let aggressive = &behaviors["aggressive"];
		let t = Triple::new(OpKind::Read, OpShape::Point, Mode::Ap);
		assert_eq!(aggressive.resolve(t).max_attempts, 5);
		assert_eq!(aggressive.resolve(t).timeout_per_attempt, Duration::from_millis(500));
	}

	#[test]
	fn missing_parent_defaults_to_default() {
		let doc = r#"
			[behaviors.DEFAULT]
			[behaviors.orphan]
		"#;
		let (behaviors, _system) = load_from_str(doc).unwrap();
		assert!(behaviors.contains_key("orphan"));
	}

	#[test]
	fn cyclic_parent_chain_is_a_configuration_error() {
		let doc = r#"
			[behaviors.DEFAULT]
			[behaviors.a]
			parent = "b"
			[behaviors.b]
			parent = "a"
		"#;
		let err = load_from_str(doc).unwrap_err();
		assert_eq!(err.kind(), ErrorKind::ConfigError);
	}

	#[test]
	fn duration_units_parse() {
		assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
		assert_eq!(parse_duration("2 s").unwrap(), Duration::from_secs(2));
		assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3_600));
	}

	#[test]
	fn system_settings_merge_over_baseline() {
		let doc = r#"
			[behaviors.DEFAULT]
			[system.DEFAULT.connections]
			maximum_connections_per_node = 50
		"#;
		let (_behaviors, system) = load_from_str(doc).unwrap();
		assert_eq!(system["DEFAULT"].connections.maximum_connections_per_node, 50);
		assert_eq!(system["DEFAULT"].connections.minimum_connections_per_node, 1);
	}
}
