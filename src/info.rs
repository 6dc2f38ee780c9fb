//! Cluster metadata aggregation: per-node metric collection combined by a declarative merge
//! rule, refreshed on a background interval, with change listeners.

use crate::err::Error;
use crate::err::ErrorKind;
use crate::session::Session;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::warn;

/// How per-node values for one metric are combined into a single cluster-wide value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeRule {
	/// The sum of every node's numeric value.
	Sum,
	/// The arithmetic mean of every node's numeric value.
	Average,
	/// The logical AND of every node's boolean value.
	LogicalAnd,
	/// The logical OR of every node's boolean value.
	LogicalOr,
	/// The value reported by the first node that reported it, in node order.
	First,
	/// Every node must report the same value, or the merge fails.
	Unanimous,
}

impl MergeRule {
	fn merge(&self, values: &[Value]) -> Result<Value, Error> {
		match self {
			MergeRule::Sum => {
				let total: f64 = values.iter().filter_map(Value::as_f64).sum();
				Ok(Value::from(total))
			}
			MergeRule::Average => {
				if values.is_empty() {
					return Ok(Value::Null);
				}
				let total: f64 = values.iter().filter_map(Value::as_f64).sum();
				Ok(Value::from(total / values.len() as f64))
			}
			MergeRule::LogicalAnd => Ok(Value::from(values.iter().all(|v| v.as_bool().unwrap_or(false)))),
			MergeRule::LogicalOr => Ok(Value::from(values.iter().any(|v| v.as_bool().unwrap_or(false)))),
			MergeRule::First => values.first().cloned().ok_or_else(|| ErrorKind::UnknownMetric.with_context("no node reported a value")),
			MergeRule::Unanimous => {
				let first = values.first().ok_or_else(|| ErrorKind::UnknownMetric.with_context("no node reported a value"))?;
				if values.iter().all(|v| v == first) {
					Ok(first.clone())
				} else {
					Err(ErrorKind::UnknownMetric.with_context("nodes disagree on metric value"))
				}
			}
		}
	}
}

/// Decodes one node's raw info response into its reported metric values.
pub type MetricDecoder = Arc<dyn Fn(Vec<u8>) -> Result<HashMap<String, Value>, Error> + Send + Sync>;

/// Called with the metric name and its freshly merged value whenever a refresh changes it.
pub type ChangeListener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

struct State {
	cluster: HashMap<String, Value>,
	per_node: HashMap<String, HashMap<String, Value>>,
}

/// Aggregates a cluster's per-node metrics into a merged view, kept current by a background
/// refresh task.
pub struct InfoAggregator {
	session: Arc<dyn Session>,
	request: Vec<u8>,
	decode: MetricDecoder,
	rules: HashMap<String, MergeRule>,
	state: RwLock<State>,
	listeners: RwLock<Vec<ChangeListener>>,
	stop: Arc<AtomicBool>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for InfoAggregator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("InfoAggregator")
			.field("metrics", &self.rules.keys().collect::<Vec<_>>())
			.field("running", &!self.stop.load(Ordering::SeqCst))
			.finish()
	}
}

impl InfoAggregator {
	/// Builds an aggregator with no background task running yet; call [`InfoAggregator::start`]
	/// to begin periodic refresh, or [`InfoAggregator::refresh`] to poll once.
	pub fn new(session: Arc<dyn Session>, request: Vec<u8>, decode: MetricDecoder, rules: HashMap<String, MergeRule>) -> InfoAggregator {
		InfoAggregator {
			session,
			request,
			decode,
			rules,
			state: RwLock::new(State { cluster: HashMap::new(), per_node: HashMap::new() }),
			listeners: RwLock::new(Vec::new()),
			stop: Arc::new(AtomicBool::new(false)),
			handle: Mutex::new(None),
		}
	}

	/// Registers a listener fired with `(metric, new_value)` whenever a refresh changes a
	/// metric's merged value.
	pub fn on_change(&self, listener: ChangeListener) {
		self.listeners.write().unwrap().push(listener);
	}

	/// The last merged value for `metric`, or *unknown metric* if it has never resolved.
	pub fn get(&self, metric: &str) -> Result<Value, Error> {
		self.state
			.read()
			.unwrap()
			.cluster
			.get(metric)
			.cloned()
			.ok_or_else(|| ErrorKind::UnknownMetric.with_context(format!("metric `{metric}` has no recognized merge rule")))
	}

	/// The raw value last reported by `node` for `metric`, if any.
	pub fn node_value(&self, node: &str, metric: &str) -> Option<Value> {
		self.state.read().unwrap().per_node.get(node).and_then(|values| values.get(metric)).cloned()
	}

	/// Polls every known node once, merges the results, and fires listeners for changed metrics.
	/// Does not touch the background task.
	pub async fn refresh(&self) -> Result<(), Error> {
		let mut per_node = HashMap::new();
		for node in self.session.nodes() {
			match self.session.invoke(&node, self.request.clone()).await {
				Ok(bytes) => match (self.decode)(bytes) {
					Ok(values) => {
						per_node.insert(node, values);
					}
					Err(err) => warn!(node = %node, error = %err, "failed to decode node info response"),
				},
				Err(err) => warn!(node = %node, error = %err, "failed to collect node info"),
			}
		}

		let mut names: Vec<&String> = per_node.values().flat_map(HashMap::keys).collect();
		names.sort();
		names.dedup();

		let mut merged = HashMap::new();
		let mut changed = Vec::new();
		for name in names {
			let Some(rule) = self.rules.get(name) else { continue };
			let values: Vec<Value> = per_node.values().filter_map(|v| v.get(name).cloned()).collect();
			match rule.merge(&values) {
				Ok(value) => {
					merged.insert(name.clone(), value);
				}
				Err(err) => warn!(metric = %name, error = %err, "metric merge failed, keeping previous value"),
			}
		}

		{
			let mut state = self.state.write().unwrap();
			for (name, value) in &merged {
				if state.cluster.get(name) != Some(value) {
					changed.push((name.clone(), value.clone()));
				}
			}
			for (name, value) in merged {
				state.cluster.insert(name, value);
			}
			state.per_node = per_node;
		}

		let listeners = self.listeners.read().unwrap();
		for (name, value) in &changed {
			for listener in listeners.iter() {
				listener(name, value);
			}
		}
		Ok(())
	}

	/// Starts the background refresh task, polling every `interval`. Refresh failures are logged
	/// and leave previously cached values visible; they never propagate to callers of
	/// [`InfoAggregator::get`]. Replaces any task already running.
	pub fn start(self: &Arc<Self>, interval: Duration) {
		self.stop.store(false, Ordering::SeqCst);
		let this = self.clone();
		let stop = self.stop.clone();
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			loop {
				ticker.tick().await;
				if stop.load(Ordering::SeqCst) {
					return;
				}
				if let Err(err) = this.refresh().await {
					error!(error = %err, "background info refresh failed");
				}
			}
		});
		if let Some(previous) = self.handle.lock().unwrap().replace(handle) {
			previous.abort();
		}
	}

	/// Stops the background task, if running.
	pub fn stop(&self) {
		self.stop.store(true, Ordering::SeqCst);
		if let Some(handle) = self.handle.lock().unwrap().take() {
			handle.abort();
		}
	}
}

impl Drop for InfoAggregator {
	fn drop(&mut self) {
		self.stop.store(true, Ordering::SeqCst);
		if let Some(handle) = self.handle.get_mut().unwrap().take() {
			handle.abort();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::test_support::FakeSession;
	use std::sync::atomic::AtomicUsize;

	fn decoder() -> MetricDecoder {
		Arc::new(|bytes| serde_json::from_slice(&bytes).map_err(Error::from))
	}

	#[tokio::test]
	async fn sum_merges_across_nodes() {
		let session: Arc<dyn Session> = Arc::new(
			FakeSession::new(vec!["n1".into(), "n2".into()])
				.with_response("n1", serde_json::to_vec(&serde_json::json!({"open_connections": 3})).unwrap())
				.with_response("n2", serde_json::to_vec(&serde_json::json!({"open_connections": 5})).unwrap()),
		);
		let mut rules = HashMap::new();
		rules.insert("open_connections".to_string(), MergeRule::Sum);
		let aggregator = InfoAggregator::new(session, vec![], decoder(), rules);
		aggregator.refresh().await.unwrap();
		assert_eq!(aggregator.get("open_connections").unwrap(), Value::from(8.0));
	}

	#[tokio::test]
	async fn unanimous_mismatch_leaves_metric_unknown() {
		let session: Arc<dyn Session> = Arc::new(
			FakeSession::new(vec!["n1".into(), "n2".into()])
				.with_response("n1", serde_json::to_vec(&serde_json::json!({"cluster_name": "a"})).unwrap())
				.with_response("n2", serde_json::to_vec(&serde_json::json!({"cluster_name": "b"})).unwrap()),
		);
		let mut rules = HashMap::new();
		rules.insert("cluster_name".to_string(), MergeRule::Unanimous);
		let aggregator = InfoAggregator::new(session, vec![], decoder(), rules);
		aggregator.refresh().await.unwrap();
		assert_eq!(aggregator.get("cluster_name").unwrap_err().kind(), ErrorKind::UnknownMetric);
	}

	#[tokio::test]
	async fn metric_with_no_recognized_rule_is_unknown() {
		let session: Arc<dyn Session> =
			Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", serde_json::to_vec(&serde_json::json!({"mystery": 1})).unwrap()));
		let aggregator = InfoAggregator::new(session, vec![], decoder(), HashMap::new());
		aggregator.refresh().await.unwrap();
		assert_eq!(aggregator.get("mystery").unwrap_err().kind(), ErrorKind::UnknownMetric);
	}

	#[tokio::test]
	async fn listener_fires_on_change_only() {
		let session: Arc<dyn Session> =
			Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", serde_json::to_vec(&serde_json::json!({"errors": 1})).unwrap()));
		let mut rules = HashMap::new();
		rules.insert("errors".to_string(), MergeRule::Sum);
		let aggregator = InfoAggregator::new(session, vec![], decoder(), rules);
		let fired = Arc::new(AtomicUsize::new(0));
		let fired_in_listener = fired.clone();
		aggregator.on_change(Arc::new(move |_name, _value| {
			fired_in_listener.fetch_add(1, Ordering::SeqCst);
		}));
		aggregator.refresh().await.unwrap();
		aggregator.refresh().await.unwrap();
		assert_eq!(fired.load(Ordering::SeqCst), 1);
	}
}
