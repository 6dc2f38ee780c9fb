//! The fully-populated per-triple settings record and its constituent enums.

use std::time::Duration;

/// Replica selection order for a read.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplicaOrder {
	/// Always the master replica.
	Master,
	/// Master, falling back to a prole (secondary) replica on failure.
	MasterProles,
	/// A deterministic sequence across all replicas, spreading load.
	Sequence,
	/// A randomly chosen replica per attempt.
	Random,
}

/// Write commit acknowledgement level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommitLevel {
	/// Wait for all replicas to commit.
	CommitAll,
	/// Wait only for the master replica to commit.
	CommitMaster,
}

/// Read consistency guarantee under AP (eventually-consistent) mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsistencyAp {
	/// A single replica's value is sufficient.
	One,
	/// Reconcile across all replicas before returning.
	All,
}

/// Read consistency guarantee under CP (strict) mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsistencyCp {
	/// Serve from any replica once linearizability is established.
	Linearize,
	/// Allow serving from a replica that may be behind.
	AllowReplica,
}

/// A fully-populated record of the knobs governing one (kind, shape, mode) triple. Produced by
/// [`crate::behavior::matrix::Behavior::resolve`]; never partially filled.
#[derive(Clone, Copy, Debug)]
pub struct Settings {
	/// Per-attempt network timeout.
	pub timeout_per_attempt: Duration,
	/// Overall timeout across every attempt.
	pub timeout_total: Duration,
	/// Connection-establishment timeout.
	pub timeout_connect: Duration,
	/// Minimum delay observed after a failed attempt before the next one.
	pub timeout_post_fail: Duration,
	/// Maximum number of call attempts, including the first.
	pub max_attempts: u32,
	/// Base delay between retries (exponential backoff multiplies this).
	pub retry_backoff: Duration,
	/// Replica selection order.
	pub replica_order: ReplicaOrder,
	/// Whether to send the user key alongside the digest.
	pub send_key: bool,
	/// Whether to compress the wire payload.
	pub compression: bool,
	/// Whether deletes bypass the tombstone bin and are durable immediately.
	pub durable_delete: bool,
	/// Write commit level.
	pub commit_level: CommitLevel,
	/// AP read consistency.
	pub read_consistency_ap: ConsistencyAp,
	/// CP read consistency.
	pub read_consistency_cp: ConsistencyCp,
	/// Percentage of a record's TTL that must elapse before a read refreshes it.
	pub touch_ttl_percent: u32,
	/// Maximum concurrent sub-requests within one batch call.
	pub batch_concurrency: u32,
	/// Whether small batch values may be inlined rather than fetched as separate ops.
	pub batch_allow_inline: bool,
	/// Whether inlining is additionally allowed on SSD-backed namespaces.
	pub batch_allow_inline_ssd: bool,
	/// Depth of the client-side query result queue.
	pub query_queue_size: u32,
}

impl Settings {
	/// The baseline every field of DEFAULT starts from before any patch is applied. Chosen to be
	/// conservative (safe under both AP and CP) rather than tuned for any one cluster shape.
	pub fn baseline() -> Settings {
		Settings {
			timeout_per_attempt: Duration::from_millis(1_000),
			timeout_total: Duration::from_millis(1_000),
			timeout_connect: Duration::from_millis(1_000),
			timeout_post_fail: Duration::from_millis(10),
			max_attempts: 2,
			retry_backoff: Duration::from_millis(20),
			replica_order: ReplicaOrder::Sequence,
			send_key: false,
			compression: false,
			durable_delete: false,
			commit_level: CommitLevel::CommitAll,
			read_consistency_ap: ConsistencyAp::One,
			read_consistency_cp: ConsistencyCp::Linearize,
			touch_ttl_percent: 80,
			batch_concurrency: 1,
			batch_allow_inline: true,
			batch_allow_inline_ssd: false,
			query_queue_size: 100,
		}
	}
}

/// Bounds on connections maintained per cluster node.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionSettings {
	/// Minimum pooled connections kept warm per node.
	pub minimum_connections_per_node: u32,
	/// Maximum pooled connections allowed per node.
	pub maximum_connections_per_node: u32,
	/// How long an idle connection is kept before being closed.
	pub maximum_socket_idle_time: Duration,
}

/// The sliding-window circuit breaker governing when a node is taken out of rotation.
#[derive(Clone, Copy, Debug)]
pub struct CircuitBreakerSettings {
	/// Width of the error-rate window, in tend intervals.
	pub num_tend_intervals_in_error_window: u32,
	/// Error count within the window that trips the breaker.
	pub maximum_errors_in_error_window: u32,
}

/// Background cluster-tending cadence.
#[derive(Clone, Copy, Debug)]
pub struct RefreshSettings {
	/// How often the cluster map and node health are refreshed.
	pub tend_interval: Duration,
}

/// System-wide settings, keyed by cluster name (or `"DEFAULT"`) at load time; see
/// [`crate::behavior::config`].
#[derive(Clone, Copy, Debug)]
pub struct SystemSettings {
	/// Connection pool bounds.
	pub connections: ConnectionSettings,
	/// Circuit breaker configuration.
	pub circuit_breaker: CircuitBreakerSettings,
	/// Tending cadence.
	pub refresh: RefreshSettings,
}

impl SystemSettings {
	/// The baseline DEFAULT system settings.
	pub fn baseline() -> SystemSettings {
		SystemSettings {
			connections: ConnectionSettings {
				minimum_connections_per_node: 1,
				maximum_connections_per_node: 100,
				maximum_socket_idle_time: Duration::from_secs(55),
			},
			circuit_breaker: CircuitBreakerSettings { num_tend_intervals_in_error_window: 1, maximum_errors_in_error_window: 100 },
			refresh: RefreshSettings { tend_interval: Duration::from_secs(1) },
		}
	}

	/// Merges a per-cluster override on top of a baseline: every field the override sets wins,
	/// fields it leaves as `None` keep the baseline's value. Mirrors the behavior patch
	/// last-write-wins rule, one layer deep.
	pub fn merge(default: SystemSettings, over: PartialSystemSettings) -> SystemSettings {
		SystemSettings {
			connections: ConnectionSettings {
				minimum_connections_per_node: over.minimum_connections_per_node.unwrap_or(default.connections.minimum_connections_per_node),
				maximum_connections_per_node: over.maximum_connections_per_node.unwrap_or(default.connections.maximum_connections_per_node),
				maximum_socket_idle_time: over.maximum_socket_idle_time.unwrap_or(default.connections.maximum_socket_idle_time),
			},
			circuit_breaker: CircuitBreakerSettings {
				num_tend_intervals_in_error_window: over
					.num_tend_intervals_in_error_window
					.unwrap_or(default.circuit_breaker.num_tend_intervals_in_error_window),
				maximum_errors_in_error_window: over
					.maximum_errors_in_error_window
					.unwrap_or(default.circuit_breaker.maximum_errors_in_error_window),
			},
			refresh: RefreshSettings { tend_interval: over.tend_interval.unwrap_or(default.refresh.tend_interval) },
		}
	}
}

/// A sparse per-cluster override parsed from the `system` table; every field optional.
#[derive(Clone, Copy, Debug, Default)]
pub struct PartialSystemSettings {
	/// Overrides the minimum pooled connections per node.
	pub minimum_connections_per_node: Option<u32>,
	/// Overrides the maximum pooled connections per node.
	pub maximum_connections_per_node: Option<u32>,
	/// Overrides the maximum idle time before a pooled connection is closed.
	pub maximum_socket_idle_time: Option<Duration>,
	/// Overrides the number of tend intervals the error window spans.
	pub num_tend_intervals_in_error_window: Option<u32>,
	/// Overrides the error count that trips the circuit breaker within the window.
	pub maximum_errors_in_error_window: Option<u32>,
	/// Overrides the cluster tend interval.
	pub tend_interval: Option<Duration>,
}
