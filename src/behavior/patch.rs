//! A single selector-scoped set of field overrides.

use crate::behavior::selector::Selector;
use crate::behavior::settings::CommitLevel;
use crate::behavior::settings::ConsistencyAp;
use crate::behavior::settings::ConsistencyCp;
use crate::behavior::settings::ReplicaOrder;
use crate::behavior::settings::Settings;
use std::collections::HashMap;
use std::time::Duration;

/// One overridable field of [`Settings`], used as the key of a [`Patch`]'s override map.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Field {
	/// Per-attempt timeout.
	TimeoutPerAttempt,
	/// Total timeout across all attempts.
	TimeoutTotal,
	/// Connection-establishment timeout.
	TimeoutConnect,
	/// Extra grace period granted after the last attempt fails.
	TimeoutPostFail,
	/// Maximum number of attempts, including the first.
	MaxAttempts,
	/// Delay between retry attempts.
	RetryBackoff,
	/// Replica selection order.
	ReplicaOrder,
	/// Whether to send the record key alongside the digest.
	SendKey,
	/// Whether to compress the payload on the wire.
	Compression,
	/// Whether a delete leaves a durable tombstone.
	DurableDelete,
	/// Write commit level.
	CommitLevel,
	/// Read consistency under AP mode.
	ReadConsistencyAp,
	/// Read consistency under CP mode.
	ReadConsistencyCp,
	/// Touch-on-read TTL threshold, as a percentage of the record's TTL.
	TouchTtlPercent,
	/// Maximum concurrent sub-batches for a batched call.
	BatchConcurrency,
	/// Whether small batches may be served inline rather than proxied.
	BatchAllowInline,
	/// Whether small batches may be served inline even on SSD-backed namespaces.
	BatchAllowInlineSsd,
	/// Depth of the query result queue.
	QueryQueueSize,
}

/// The typed value carried by one [`Field`] override.
#[derive(Clone, Copy, Debug)]
pub enum FieldValue {
	/// A duration-valued field.
	Duration(Duration),
	/// A count or percentage field.
	U32(u32),
	/// A boolean toggle field.
	Bool(bool),
	/// A replica-order field.
	ReplicaOrder(ReplicaOrder),
	/// A commit-level field.
	CommitLevel(CommitLevel),
	/// An AP-consistency field.
	ConsistencyAp(ConsistencyAp),
	/// A CP-consistency field.
	ConsistencyCp(ConsistencyCp),
}

/// A selector-scoped bundle of field overrides, the unit a [`crate::behavior::matrix::Behavior`]
/// stores one-per-config-entry. Created in one shot by [`PatchBuilder::build`] so a patch is
/// always a complete, immutable fact once it exists.
#[derive(Clone, Debug)]
pub struct Patch {
	/// The selector this patch applies under.
	pub selector: Selector,
	pub(crate) overrides: HashMap<Field, FieldValue>,
}

impl Patch {
	/// True iff this patch sets `field`.
	pub fn sets(&self, field: Field) -> bool {
		self.overrides.contains_key(&field)
	}

	/// This patch's value for `field`, if it sets one.
	pub fn value(&self, field: Field) -> Option<FieldValue> {
		self.overrides.get(&field).copied()
	}
}

/// All overridable fields, in a fixed order used to drive field-by-field resolution.
pub const ALL_FIELDS: &[Field] = &[
	Field::TimeoutPerAttempt,
	Field::TimeoutTotal,
	Field::TimeoutConnect,
	Field::TimeoutPostFail,
	Field::MaxAttempts,
	Field::RetryBackoff,
	Field::ReplicaOrder,
	Field::SendKey,
	Field::Compression,
	Field::DurableDelete,
	Field::CommitLevel,
	Field::ReadConsistencyAp,
	Field::ReadConsistencyCp,
	Field::TouchTtlPercent,
	Field::BatchConcurrency,
	Field::BatchAllowInline,
	Field::BatchAllowInlineSsd,
	Field::QueryQueueSize,
];

/// Applies one field/value pair onto `settings`.
///
/// Panics if `value`'s variant disagrees with `field`'s expected type; this can't happen through
/// [`PatchBuilder`], which only ever stores field/value pairs it constructed together.
pub(crate) fn apply_field(settings: &mut Settings, field: Field, value: FieldValue) {
	macro_rules! expect {
		($variant:ident) => {
			match value {
				FieldValue::$variant(v) => v,
				other => unreachable!("Field::{field:?} paired with mismatched {other:?}"),
			}
		};
	}
	match field {
		Field::TimeoutPerAttempt => settings.timeout_per_attempt = expect!(Duration),
		Field::TimeoutTotal => settings.timeout_total = expect!(Duration),
		Field::TimeoutConnect => settings.timeout_connect = expect!(Duration),
		Field::TimeoutPostFail => settings.timeout_post_fail = expect!(Duration),
		Field::MaxAttempts => settings.max_attempts = expect!(U32),
		Field::RetryBackoff => settings.retry_backoff = expect!(Duration),
		Field::ReplicaOrder => settings.replica_order = expect!(ReplicaOrder),
		Field::SendKey => settings.send_key = expect!(Bool),
		Field::Compression => settings.compression = expect!(Bool),
		Field::DurableDelete => settings.durable_delete = expect!(Bool),
		Field::CommitLevel => settings.commit_level = expect!(CommitLevel),
		Field::ReadConsistencyAp => settings.read_consistency_ap = expect!(ConsistencyAp),
		Field::ReadConsistencyCp => settings.read_consistency_cp = expect!(ConsistencyCp),
		Field::TouchTtlPercent => settings.touch_ttl_percent = expect!(U32),
		Field::BatchConcurrency => settings.batch_concurrency = expect!(U32),
		Field::BatchAllowInline => settings.batch_allow_inline = expect!(Bool),
		Field::BatchAllowInlineSsd => settings.batch_allow_inline_ssd = expect!(Bool),
		Field::QueryQueueSize => settings.query_queue_size = expect!(U32),
	}
}

/// Builds one [`Patch`] under a fixed selector.
#[derive(Debug)]
pub struct PatchBuilder {
	selector: Selector,
	overrides: HashMap<Field, FieldValue>,
}

impl PatchBuilder {
	/// Starts a new patch scoped to `selector`.
	pub fn new(selector: Selector) -> Self {
		PatchBuilder { selector, overrides: HashMap::new() }
	}

	fn set(mut self, field: Field, value: FieldValue) -> Self {
		self.overrides.insert(field, value);
		self
	}

	/// Overrides the per-attempt timeout.
	pub fn timeout_per_attempt(self, d: Duration) -> Self {
		self.set(Field::TimeoutPerAttempt, FieldValue::Duration(d))
	}
	/// Overrides the total timeout across all attempts.
	pub fn timeout_total(self, d: Duration) -> Self {
		self.set(Field::TimeoutTotal, FieldValue::Duration(d))
	}
	/// Overrides the connection-establishment timeout.
	pub fn timeout_connect(self, d: Duration) -> Self {
		self.set(Field::TimeoutConnect, FieldValue::Duration(d))
	}
	/// Overrides the post-failure grace period.
	pub fn timeout_post_fail(self, d: Duration) -> Self {
		self.set(Field::TimeoutPostFail, FieldValue::Duration(d))
	}
	/// Overrides the maximum number of attempts, including the first.
	pub fn max_attempts(self, n: u32) -> Self {
		self.set(Field::MaxAttempts, FieldValue::U32(n))
	}
	/// Overrides the delay between retry attempts.
	pub fn retry_backoff(self, d: Duration) -> Self {
		self.set(Field::RetryBackoff, FieldValue::Duration(d))
	}
	/// Overrides the replica selection order.
	pub fn replica_order(self, r: ReplicaOrder) -> Self {
		self.set(Field::ReplicaOrder, FieldValue::ReplicaOrder(r))
	}
	/// Overrides whether the record key is sent alongside the digest.
	pub fn send_key(self, b: bool) -> Self {
		self.set(Field::SendKey, FieldValue::Bool(b))
	}
	/// Overrides whether the payload is compressed on the wire.
	pub fn compression(self, b: bool) -> Self {
		self.set(Field::Compression, FieldValue::Bool(b))
	}
	/// Overrides whether a delete leaves a durable tombstone.
	pub fn durable_delete(self, b: bool) -> Self {
		self.set(Field::DurableDelete, FieldValue::Bool(b))
	}
	/// Overrides the write commit level.
	pub fn commit_level(self, c: CommitLevel) -> Self {
		self.set(Field::CommitLevel, FieldValue::CommitLevel(c))
	}
	/// Overrides read consistency under AP mode.
	pub fn read_consistency_ap(self, c: ConsistencyAp) -> Self {
		self.set(Field::ReadConsistencyAp, FieldValue::ConsistencyAp(c))
	}
	/// Overrides read consistency under CP mode.
	pub fn read_consistency_cp(self, c: ConsistencyCp) -> Self {
		self.set(Field::ReadConsistencyCp, FieldValue::ConsistencyCp(c))
	}
	/// Overrides the touch-on-read TTL threshold percentage.
	pub fn touch_ttl_percent(self, p: u32) -> Self {
		self.set(Field::TouchTtlPercent, FieldValue::U32(p))
	}
	/// Overrides the maximum concurrent sub-batches for a batched call.
	pub fn batch_concurrency(self, n: u32) -> Self {
		self.set(Field::BatchConcurrency, FieldValue::U32(n))
	}
	/// Overrides whether small batches may be served inline.
	pub fn batch_allow_inline(self, b: bool) -> Self {
		self.set(Field::BatchAllowInline, FieldValue::Bool(b))
	}
	/// Overrides whether small batches may be served inline on SSD-backed namespaces.
	pub fn batch_allow_inline_ssd(self, b: bool) -> Self {
		self.set(Field::BatchAllowInlineSsd, FieldValue::Bool(b))
	}
	/// Overrides the depth of the query result queue.
	pub fn query_queue_size(self, n: u32) -> Self {
		self.set(Field::QueryQueueSize, FieldValue::U32(n))
	}

	/// Finalizes the patch.
	pub fn build(self) -> Patch {
		Patch { selector: self.selector, overrides: self.overrides }
	}
}
