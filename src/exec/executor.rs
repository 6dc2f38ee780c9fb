//! Execution strategy selection and orchestration: single-key, small-N parallel fan-out, and
//! batched calls, all converging on the same [`crate::stream::AsyncRecordStream`].

use crate::err::Error;
use crate::err::ErrorKind;
use crate::expr::filter::Filter;
use crate::expr::node::LiteralValue;
use crate::session::Session;
use crate::stream::AsyncRecordStream;
use crate::stream::Outcome;
use crate::stream::RecordEvent;
use crate::stream::RecordKey;
use crate::stream::RecordStreamView;
use futures_concurrency::future::Join;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::warn;

/// Below this many keys, the executor fans out one worker per key instead of issuing a single
/// batched call. The spec's default.
pub const DEFAULT_BATCH_THRESHOLD: usize = 10;

/// The strategy the executor selects for a given number of keys.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Strategy {
	/// Exactly one key: one remote call, delivered as a one-element stream.
	SingleKey,
	/// Fewer than the threshold: one worker task per key.
	SmallN,
	/// At least the threshold: one batched call, results mapped back in request order.
	Batch,
}

/// Selects a strategy for `key_count` keys given `threshold` (see [`DEFAULT_BATCH_THRESHOLD`]).
pub fn choose_strategy(key_count: usize, threshold: usize) -> Strategy {
	match key_count {
		0 | 1 => Strategy::SingleKey,
		n if n < threshold => Strategy::SmallN,
		_ => Strategy::Batch,
	}
}

/// Whether `execute` waits for every worker before returning, or returns the stream immediately.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionMode {
	/// Waits for every worker to finish; the caller observes a fully-drained (or, given enough
	/// capacity, fully-buffered) stream upon return. Required inside a transactional scope.
	Synchronous,
	/// Returns the stream view immediately; workers keep running in the background.
	Asynchronous,
}

/// A compiled filter predicate applied against a decoded record to decide whether it passes,
/// pairing the bin it targets with the [`Filter`] extracted from the expression (see
/// [`crate::expr::filter::extract`]). Evaluated client-side once the raw response is decoded,
/// since the core has no other opportunity to observe a record's field values.
#[derive(Clone, Debug)]
pub struct FilterSpec {
	/// The bin the filter targets.
	pub bin: String,
	/// The predicate itself.
	pub filter: Filter,
}

/// One prepared single-key call: which node to invoke, the already-encoded request, and a
/// decoder translating the raw response into this key's [`Outcome`]. Request encoding and
/// response decoding are entirely the caller's concern — the core does not define the wire
/// format.
pub struct KeyCall {
	/// The key this call reports on.
	pub key: RecordKey,
	/// The node to invoke.
	pub node: String,
	/// The already-encoded request payload.
	pub request: Vec<u8>,
	/// Decodes this call's raw response into an [`Outcome`].
	pub decode: Arc<dyn Fn(Vec<u8>) -> Result<Outcome, Error> + Send + Sync>,
	/// An optional filter applied to a decoded [`Outcome::Record`] before publication.
	pub filter: Option<FilterSpec>,
}

impl std::fmt::Debug for KeyCall {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyCall")
			.field("key", &self.key)
			.field("node", &self.node)
			.field("request_len", &self.request.len())
			.field("filter", &self.filter)
			.finish()
	}
}

/// A single batched call covering every key in `keys`, decoded into one [`Outcome`] per key in
/// request order.
pub struct BatchCall {
	/// The keys covered by this call, in request order.
	pub keys: Vec<RecordKey>,
	/// The node to invoke.
	pub node: String,
	/// The already-encoded batched request payload.
	pub request: Vec<u8>,
	/// Decodes the batched response into one outcome per key, in `keys`' order.
	pub decode: Arc<dyn Fn(Vec<u8>) -> Result<Vec<Outcome>, Error> + Send + Sync>,
	/// An optional filter applied to every decoded [`Outcome::Record`] in the batch before
	/// publication.
	pub filter: Option<FilterSpec>,
}

impl std::fmt::Debug for BatchCall {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BatchCall")
			.field("keys", &self.keys)
			.field("node", &self.node)
			.field("request_len", &self.request.len())
			.field("filter", &self.filter)
			.finish()
	}
}

/// Checks a decoded record against a [`FilterSpec`]'s bin and predicate. A bin missing from the
/// record, or a value whose type can't be compared against the literal, does not pass.
fn passes_filter(record: &serde_json::Value, spec: &FilterSpec) -> bool {
	let Some(value) = record.get(&spec.bin) else { return false };
	match &spec.filter {
		Filter::Equal(lit) => literal_eq(value, lit),
		Filter::Range(low, high) => {
			low.as_ref().map_or(true, |l| literal_cmp(value, l).is_some_and(|o| o != Ordering::Less))
				&& high.as_ref().map_or(true, |h| literal_cmp(value, h).is_some_and(|o| o != Ordering::Greater))
		}
		// The core threads a geospatial region through without interpreting it; only the server
		// can evaluate containment.
		Filter::GeoWithin(_) => true,
	}
}

fn literal_eq(value: &serde_json::Value, lit: &LiteralValue) -> bool {
	match lit {
		LiteralValue::Int(i) => value.as_i64() == Some(*i),
		LiteralValue::Float(f) => value.as_f64() == Some(*f),
		LiteralValue::Str(s) => value.as_str() == Some(s.as_str()),
		LiteralValue::Bool(b) => value.as_bool() == Some(*b),
		LiteralValue::Blob(bytes) => value
			.as_array()
			.map(|arr| arr.iter().filter_map(serde_json::Value::as_u64).map(|n| n as u8).collect::<Vec<u8>>())
			.as_deref()
			== Some(bytes.as_slice()),
	}
}

fn literal_cmp(value: &serde_json::Value, lit: &LiteralValue) -> Option<Ordering> {
	match lit {
		LiteralValue::Int(i) => value.as_i64().map(|v| v.cmp(i)),
		LiteralValue::Float(f) => value.as_f64().and_then(|v| v.partial_cmp(f)),
		LiteralValue::Str(s) => value.as_str().map(|v| v.cmp(s.as_str())),
		LiteralValue::Bool(_) | LiteralValue::Blob(_) => None,
	}
}

/// Applies `filter` (if any) to `outcome`, turning a non-passing [`Outcome::Record`] into
/// [`Outcome::FilteredOut`]. Misses and errors are unaffected.
fn apply_filter(outcome: Outcome, filter: Option<&FilterSpec>) -> Outcome {
	match (outcome, filter) {
		(Outcome::Record(record), Some(spec)) if !passes_filter(&record, spec) => Outcome::FilteredOut,
		(other, _) => other,
	}
}

/// The work the executor is asked to perform, already shaped for the chosen [`Strategy`].
pub enum Work {
	/// Single-key or small-N: one call per key.
	PerKey(Vec<KeyCall>),
	/// Batch: one call for every key.
	Batched(BatchCall),
}

impl std::fmt::Debug for Work {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Work::PerKey(calls) => f.debug_tuple("PerKey").field(calls).finish(),
			Work::Batched(batch) => f.debug_tuple("Batched").field(batch).finish(),
		}
	}
}

impl Work {
	fn key_count(&self) -> usize {
		match self {
			Work::PerKey(calls) => calls.len(),
			Work::Batched(batch) => batch.keys.len(),
		}
	}
}

/// Per-key result-inclusion policy, per §4.5.
#[derive(Clone, Copy, Debug)]
pub struct InclusionPolicy {
	/// Emit one event per key unconditionally (records, misses, and errors).
	pub respond_all_keys: bool,
	/// Surface a filtered-out outcome as an error event rather than suppressing it.
	pub fail_on_filtered_out: bool,
}

impl InclusionPolicy {
	/// Decides whether `outcome` should be published under this policy, transforming it along the
	/// way: a suppressed outcome returns `None`, and a filtered-out record becomes an error event
	/// when `fail_on_filtered_out` is set.
	fn classify(&self, outcome: Outcome) -> Option<Outcome> {
		match outcome {
			Outcome::Record(_) | Outcome::Error(_) => Some(outcome),
			Outcome::Miss => self.respond_all_keys.then_some(outcome),
			Outcome::FilteredOut if self.fail_on_filtered_out => {
				Some(Outcome::Error(ErrorKind::FilteredOut.with_message("record excluded by filter expression")))
			}
			Outcome::FilteredOut => None,
		}
	}
}

/// Runs `work` under `mode`, publishing admitted events onto a freshly created stream and
/// returning its consumer-facing view. Inside an open transaction, [`ExecutionMode::Asynchronous`]
/// logs a warning and proceeds rather than refusing the call.
pub async fn execute(session: Arc<dyn Session>, work: Work, inclusion: InclusionPolicy, mode: ExecutionMode) -> RecordStreamView {
	if mode == ExecutionMode::Asynchronous && session.transaction().is_some() {
		warn!("asynchronous execution requested inside an open transaction; proceeding anyway");
	}
	let stream = AsyncRecordStream::bounded(work.key_count().max(1));
	let producer = stream.clone();
	let drive = async move {
		match work {
			Work::PerKey(calls) => run_per_key(session, calls, inclusion, &producer).await,
			Work::Batched(batch) => run_batched(session, batch, inclusion, &producer).await,
		}
		producer.complete();
	};
	match mode {
		ExecutionMode::Synchronous => drive.await,
		ExecutionMode::Asynchronous => {
			tokio::spawn(drive);
		}
	}
	stream.into_stream()
}

async fn run_per_key(session: Arc<dyn Session>, calls: Vec<KeyCall>, inclusion: InclusionPolicy, stream: &AsyncRecordStream) {
	let futures: Vec<_> = calls
		.into_iter()
		.enumerate()
		.map(|(index, call)| {
			let session = session.clone();
			let stream = stream.clone();
			async move {
				// A worker must not issue new I/O once the stream has been cancelled, but an
				// in-flight call is allowed to finish; this only gates calls that haven't started.
				if stream.cancelled() {
					return None;
				}
				let outcome = match session.invoke(&call.node, call.request).await {
					Ok(bytes) => (call.decode)(bytes).unwrap_or_else(Outcome::Error),
					Err(err) => Outcome::Error(err),
				};
				let outcome = apply_filter(outcome, call.filter.as_ref());
				Some(RecordEvent { key: call.key, index, outcome })
			}
		})
		.collect();
	let results = futures.join().await;
	for event in results.into_iter().flatten() {
		if let Some(outcome) = inclusion.classify(event.outcome) {
			stream.publish(RecordEvent { key: event.key, index: event.index, outcome }).await;
		}
	}
}

async fn run_batched(session: Arc<dyn Session>, batch: BatchCall, inclusion: InclusionPolicy, stream: &AsyncRecordStream) {
	let outcomes = match session.invoke(&batch.node, batch.request).await {
		Ok(bytes) => (batch.decode)(bytes).unwrap_or_else(|err| batch.keys.iter().map(|_| Outcome::Error(err.clone())).collect()),
		Err(err) => batch.keys.iter().map(|_| Outcome::Error(err.clone())).collect(),
	};
	for (index, (key, outcome)) in batch.keys.into_iter().zip(outcomes).enumerate() {
		let outcome = apply_filter(outcome, batch.filter.as_ref());
		if let Some(outcome) = inclusion.classify(outcome) {
			stream.publish(RecordEvent { key, index, outcome }).await;
		}
	}
}

impl From<Error> for Outcome {
	fn from(err: Error) -> Self {
		Outcome::Error(err)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::test_support::FakeSession;
	use futures::StreamExt;

	fn ok_decode() -> Arc<dyn Fn(Vec<u8>) -> Result<Outcome, Error> + Send + Sync> {
		Arc::new(|bytes| Ok(Outcome::Record(serde_json::json!({ "len": bytes.len() }))))
	}

	#[test]
	fn strategy_thresholds() {
		assert_eq!(choose_strategy(0, 10), Strategy::SingleKey);
		assert_eq!(choose_strategy(1, 10), Strategy::SingleKey);
		assert_eq!(choose_strategy(9, 10), Strategy::SmallN);
		assert_eq!(choose_strategy(10, 10), Strategy::Batch);
		assert_eq!(choose_strategy(10_000, 10), Strategy::Batch);
	}

	#[tokio::test]
	async fn small_n_preserves_request_order_via_index() {
		let session: Arc<dyn Session> = Arc::new(
			FakeSession::new(vec!["n1".into()])
				.with_response("n1", b"x".to_vec()),
		);
		let calls = (0..5)
			.map(|i| KeyCall { key: RecordKey(format!("k{i}")), node: "n1".into(), request: vec![i as u8], decode: ok_decode(), filter: None })
			.collect();
		let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };
		let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;
		let mut by_index = Vec::new();
		while let Some(event) = view.next().await {
			by_index.push(event.unwrap().index);
		}
		by_index.sort();
		assert_eq!(by_index, vec![0, 1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn batch_threshold_triggers_single_call_for_twelve_keys() {
		let session: Arc<dyn Session> = Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", b"batch".to_vec()));
		let keys: Vec<RecordKey> = (0..12).map(|i| RecordKey(format!("k{i}"))).collect();
		let batch = BatchCall {
			keys: keys.clone(),
			node: "n1".into(),
			request: b"req".to_vec(),
			decode: Arc::new(|_bytes| Ok((0..12).map(|i| Outcome::Record(serde_json::json!(i))).collect())),
			filter: None,
		};
		let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };
		let mut view = execute(session.clone(), Work::Batched(batch), inclusion, ExecutionMode::Synchronous).await;
		let mut indices = Vec::new();
		while let Some(event) = view.next().await {
			indices.push(event.unwrap().index);
		}
		assert_eq!(indices, (0..12).collect::<Vec<_>>());
	}

	#[tokio::test]
	async fn bare_miss_is_suppressed_unless_respond_all_keys() {
		let session: Arc<dyn Session> = Arc::new(FakeSession::new(vec!["n1".into()]));
		let calls = vec![KeyCall {
			key: RecordKey("only".into()),
			node: "n1".into(),
			request: vec![],
			decode: Arc::new(|_| Ok(Outcome::Miss)),
			filter: None,
		}];
		let inclusion = InclusionPolicy { respond_all_keys: false, fail_on_filtered_out: false };
		let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;
		assert!(view.next().await.is_none());
	}

	fn age_decode(age: i64) -> Arc<dyn Fn(Vec<u8>) -> Result<Outcome, Error> + Send + Sync> {
		Arc::new(move |_bytes| Ok(Outcome::Record(serde_json::json!({ "age": age }))))
	}

	fn under_18_filter() -> FilterSpec {
		FilterSpec { bin: "age".into(), filter: Filter::Range(None, Some(LiteralValue::Int(18))) }
	}

	#[tokio::test]
	async fn filtered_out_record_is_suppressed_by_default() {
		let session: Arc<dyn Session> = Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", b"x".to_vec()));
		let calls = vec![KeyCall {
			key: RecordKey("adult".into()),
			node: "n1".into(),
			request: vec![],
			decode: age_decode(42),
			filter: Some(under_18_filter()),
		}];
		let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };
		let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;
		assert!(view.next().await.is_none());
	}

	#[tokio::test]
	async fn filtered_out_record_surfaces_as_error_when_fail_on_filtered_out() {
		let session: Arc<dyn Session> = Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", b"x".to_vec()));
		let calls = vec![KeyCall {
			key: RecordKey("adult".into()),
			node: "n1".into(),
			request: vec![],
			decode: age_decode(42),
			filter: Some(under_18_filter()),
		}];
		let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: true };
		let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;
		let event = view.next().await.unwrap().unwrap();
		match event.outcome {
			Outcome::Error(err) => assert_eq!(err.kind(), ErrorKind::FilteredOut),
			other => panic!("expected a filtered-out error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn record_passing_filter_is_published_normally() {
		let session: Arc<dyn Session> = Arc::new(FakeSession::new(vec!["n1".into()]).with_response("n1", b"x".to_vec()));
		let calls = vec![KeyCall {
			key: RecordKey("minor".into()),
			node: "n1".into(),
			request: vec![],
			decode: age_decode(10),
			filter: Some(under_18_filter()),
		}];
		let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: true };
		let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;
		let event = view.next().await.unwrap().unwrap();
		assert!(matches!(event.outcome, Outcome::Record(_)));
	}
}
