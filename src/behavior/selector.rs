//! The closed selector algebra: axis vocabularies, the named selector set, and the specificity
//! order used to resolve conflicting patches.

use std::collections::BTreeSet;

/// The operation kind axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OpKind {
	/// A read.
	Read,
	/// A write that may be safely retried.
	WriteRetryable,
	/// A write that must not be retried blindly.
	WriteNonRetryable,
	/// A system/administrative operation (transaction verify/roll, connections, ...).
	System,
}

/// The operation shape axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum OpShape {
	/// A single-key operation.
	Point,
	/// A multi-key batched operation.
	Batch,
	/// A secondary-index or scan query.
	Query,
	/// A system-level operation, not keyed on any record.
	System,
}

/// The consistency-mode axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Mode {
	/// Available-partition (eventually consistent) mode.
	Ap,
	/// Consistent-partition (strict) mode.
	Cp,
}

/// The concrete (kind, shape, mode) a [`crate::behavior::matrix::Behavior`] is asked to resolve
/// settings for. System operations carry no meaningful mode; callers pass either mode
/// consistently since system selectors never discriminate on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Triple {
	/// The operation kind.
	pub kind: OpKind,
	/// The operation shape.
	pub shape: OpShape,
	/// The consistency mode in effect.
	pub mode: Mode,
}

impl Triple {
	/// Builds a triple.
	pub fn new(kind: OpKind, shape: OpShape, mode: Mode) -> Self {
		Triple { kind, shape, mode }
	}
}

fn all_kinds() -> BTreeSet<OpKind> {
	[OpKind::Read, OpKind::WriteRetryable, OpKind::WriteNonRetryable, OpKind::System].into_iter().collect()
}

fn all_shapes() -> BTreeSet<OpShape> {
	[OpShape::Point, OpShape::Batch, OpShape::Query, OpShape::System].into_iter().collect()
}

fn all_modes() -> BTreeSet<Mode> {
	[Mode::Ap, Mode::Cp].into_iter().collect()
}

/// The closed set of named selectors from the configuration vocabulary. Each denotes a
/// (kind, shape, mode) cross-product via [`Selector::axes`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Selector {
	/// Every operation triple.
	All,
	/// Every read, any shape, any mode.
	Reads,
	/// Every read under AP mode.
	ReadsAp,
	/// Every read under CP mode.
	ReadsCp,
	/// Single-key point reads, any mode.
	ReadsGet,
	/// Batched reads, any mode.
	ReadsBatch,
	/// Batched reads under AP mode.
	ReadsBatchAp,
	/// Batched reads under CP mode.
	ReadsBatchCp,
	/// Secondary-index or scan queries, any mode.
	ReadsQuery,
	/// Secondary-index or scan queries under AP mode.
	ReadsQueryAp,
	/// Secondary-index or scan queries under CP mode.
	ReadsQueryCp,
	/// Every write (retryable or not), any shape, any mode.
	Writes,
	/// Every write under AP mode.
	WritesAp,
	/// Every write under CP mode.
	WritesCp,
	/// Every retryable write, any shape, any mode.
	WritesRetryable,
	/// Every non-retryable write, any shape, any mode.
	WritesNonRetryable,
	/// Single-key writes, any mode.
	WritesPoint,
	/// Single-key writes under AP mode.
	WritesPointAp,
	/// Batched writes, any mode.
	WritesBatch,
	/// Retryable single-key writes under AP mode.
	WritesRetryablePointAp,
	/// Transaction-verify system operations.
	SystemTxnVerify,
	/// Transaction-roll system operations.
	SystemTxnRoll,
	/// Connection-pool system operations.
	SystemConnections,
	/// Circuit-breaker system operations.
	SystemCircuitBreaker,
	/// Cluster-refresh system operations.
	SystemRefresh,
}

/// The axis sets a [`Selector`] denotes; the selector's triple set is their cross product.
#[derive(Clone, Debug)]
pub struct AxisSet {
	/// The kinds the selector is a member of.
	pub kinds: BTreeSet<OpKind>,
	/// The shapes the selector is a member of.
	pub shapes: BTreeSet<OpShape>,
	/// The modes the selector is a member of.
	pub modes: BTreeSet<Mode>,
}

impl AxisSet {
	fn new(kinds: Vec<OpKind>, shapes: Vec<OpShape>, modes: Vec<Mode>) -> Self {
		AxisSet { kinds: kinds.into_iter().collect(), shapes: shapes.into_iter().collect(), modes: modes.into_iter().collect() }
	}

	/// True iff this axis set's cross product contains `t`.
	pub fn contains(&self, t: Triple) -> bool {
		self.kinds.contains(&t.kind) && self.shapes.contains(&t.shape) && self.modes.contains(&t.mode)
	}

	/// True iff this axis set's cross product is a (non-strict) subset of `other`'s.
	pub fn subset_of(&self, other: &AxisSet) -> bool {
		self.kinds.is_subset(&other.kinds) && self.shapes.is_subset(&other.shapes) && self.modes.is_subset(&other.modes)
	}

	/// The number of (kind, shape, mode) triples this axis set's cross product covers. A rough
	/// size metric only — ties on this number do not imply equal specificity; use
	/// [`AxisSet::specificity`] to break them.
	pub fn cardinality(&self) -> usize {
		self.kinds.len() * self.shapes.len() * self.modes.len()
	}

	/// The specificity key used to resolve conflicting patches: `(kinds, shapes, modes)` axis
	/// cardinalities, compared lexicographically with kind most significant, then shape, then
	/// mode, per the selector vocabulary's fixed axis precedence. A smaller key is strictly more
	/// specific. Two selectors can have equal `cardinality()` (the product) while differing here
	/// — e.g. one kind x two shapes x two modes vs. two kinds x one shape x two modes both total
	/// 4, but the former is more specific on the kind axis and must win.
	pub fn specificity(&self) -> (usize, usize, usize) {
		(self.kinds.len(), self.shapes.len(), self.modes.len())
	}
}

use OpKind::*;
use OpShape::*;

impl Selector {
	/// This selector's axis sets.
	pub fn axes(&self) -> AxisSet {
		let reads = vec![Read];
		let writes = vec![WriteRetryable, WriteNonRetryable];
		match self {
			Selector::All => AxisSet::new(all_kinds().into_iter().collect(), all_shapes().into_iter().collect(), all_modes().into_iter().collect()),
			Selector::Reads => AxisSet::new(reads, vec![Point, Batch, Query], vec![Mode::Ap, Mode::Cp]),
			Selector::ReadsAp => AxisSet::new(reads, vec![Point, Batch, Query], vec![Mode::Ap]),
			Selector::ReadsCp => AxisSet::new(reads, vec![Point, Batch, Query], vec![Mode::Cp]),
			Selector::ReadsGet => AxisSet::new(reads, vec![Point], vec![Mode::Ap, Mode::Cp]),
			Selector::ReadsBatch => AxisSet::new(reads, vec![Batch], vec![Mode::Ap, Mode::Cp]),
			Selector::ReadsBatchAp => AxisSet::new(reads, vec![Batch], vec![Mode::Ap]),
			Selector::ReadsBatchCp => AxisSet::new(reads, vec![Batch], vec![Mode::Cp]),
			Selector::ReadsQuery => AxisSet::new(reads, vec![Query], vec![Mode::Ap, Mode::Cp]),
			Selector::ReadsQueryAp => AxisSet::new(reads, vec![Query], vec![Mode::Ap]),
			Selector::ReadsQueryCp => AxisSet::new(reads, vec![Query], vec![Mode::Cp]),
			Selector::Writes => AxisSet::new(writes, vec![Point, Batch], vec![Mode::Ap, Mode::Cp]),
			Selector::WritesAp => AxisSet::new(writes, vec![Point, Batch], vec![Mode::Ap]),
			Selector::WritesCp => AxisSet::new(writes, vec![Point, Batch], vec![Mode::Cp]),
			Selector::WritesRetryable => AxisSet::new(vec![WriteRetryable], vec![Point, Batch], vec![Mode::Ap, Mode::Cp]),
			Selector::WritesNonRetryable => AxisSet::new(vec![WriteNonRetryable], vec![Point, Batch], vec![Mode::Ap, Mode::Cp]),
			Selector::WritesPoint => AxisSet::new(writes, vec![Point], vec![Mode::Ap, Mode::Cp]),
			Selector::WritesPointAp => AxisSet::new(writes, vec![Point], vec![Mode::Ap]),
			Selector::WritesBatch => AxisSet::new(writes, vec![Batch], vec![Mode::Ap, Mode::Cp]),
			Selector::WritesRetryablePointAp => AxisSet::new(vec![WriteRetryable], vec![Point], vec![Mode::Ap]),
			Selector::SystemTxnVerify
			| Selector::SystemTxnRoll
			| Selector::SystemConnections
			| Selector::SystemCircuitBreaker
			| Selector::SystemRefresh => AxisSet::new(vec![OpKind::System], vec![OpShape::System], vec![Mode::Ap, Mode::Cp]),
		}
	}

	/// This selector's human-readable configuration key, used by the text loader both to parse
	/// and (in error messages) to report an unrecognized key.
	pub fn config_key(&self) -> &'static str {
		match self {
			Selector::All => "all",
			Selector::Reads => "reads",
			Selector::ReadsAp => "reads.ap",
			Selector::ReadsCp => "reads.cp",
			Selector::ReadsGet => "reads.get",
			Selector::ReadsBatch => "reads.batch",
			Selector::ReadsBatchAp => "reads.batch.ap",
			Selector::ReadsBatchCp => "reads.batch.cp",
			Selector::ReadsQuery => "reads.query",
			Selector::ReadsQueryAp => "reads.query.ap",
			Selector::ReadsQueryCp => "reads.query.cp",
			Selector::Writes => "writes",
			Selector::WritesAp => "writes.ap",
			Selector::WritesCp => "writes.cp",
			Selector::WritesRetryable => "writes.retryable",
			Selector::WritesNonRetryable => "writes.non_retryable",
			Selector::WritesPoint => "writes.point",
			Selector::WritesPointAp => "writes.point.ap",
			Selector::WritesBatch => "writes.batch",
			Selector::WritesRetryablePointAp => "writes.retryable.point.ap",
			Selector::SystemTxnVerify => "system.txn_verify",
			Selector::SystemTxnRoll => "system.txn_roll",
			Selector::SystemConnections => "system.connections",
			Selector::SystemCircuitBreaker => "system.circuit_breaker",
			Selector::SystemRefresh => "system.refresh",
		}
	}

	/// All selectors, in a fixed order used for deterministic config parsing.
	pub fn all() -> &'static [Selector] {
		&[
			Selector::All,
			Selector::Reads,
			Selector::ReadsAp,
			Selector::ReadsCp,
			Selector::ReadsGet,
			Selector::ReadsBatch,
			Selector::ReadsBatchAp,
			Selector::ReadsBatchCp,
			Selector::ReadsQuery,
			Selector::ReadsQueryAp,
			Selector::ReadsQueryCp,
			Selector::Writes,
			Selector::WritesAp,
			Selector::WritesCp,
			Selector::WritesRetryable,
			Selector::WritesNonRetryable,
			Selector::WritesPoint,
			Selector::WritesPointAp,
			Selector::WritesBatch,
			Selector::WritesRetryablePointAp,
			Selector::SystemTxnVerify,
			Selector::SystemTxnRoll,
			Selector::SystemConnections,
			Selector::SystemCircuitBreaker,
			Selector::SystemRefresh,
		]
	}

	/// Looks up a selector by its configuration key.
	pub fn from_config_key(key: &str) -> Option<Selector> {
		Selector::all().iter().copied().find(|s| s.config_key() == key)
	}

	/// True iff this selector's triple set contains `t`.
	pub fn contains(&self, t: Triple) -> bool {
		self.axes().contains(t)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn batch_ap_is_more_specific_than_batch_is_more_specific_than_reads() {
		let reads = Selector::Reads.axes();
		let batch = Selector::ReadsBatch.axes();
		let batch_ap = Selector::ReadsBatchAp.axes();
		assert!(batch.subset_of(&reads));
		assert!(batch_ap.subset_of(&batch));
		assert!(batch_ap.cardinality() < batch.cardinality());
		assert!(batch.cardinality() < reads.cardinality());
	}

	#[test]
	fn all_selectors_round_trip_through_config_key() {
		for selector in Selector::all() {
			assert_eq!(Selector::from_config_key(selector.config_key()), Some(*selector));
		}
	}

	#[test]
	fn system_selector_ignores_mode() {
		let t_ap = Triple::new(OpKind::System, OpShape::System, Mode::Ap);
		let t_cp = Triple::new(OpKind::System, OpShape::System, Mode::Cp);
		assert!(Selector::SystemRefresh.contains(t_ap));
		assert!(Selector::SystemRefresh.contains(t_cp));
	}
}
