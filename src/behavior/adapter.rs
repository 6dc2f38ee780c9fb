//! Translates a resolved [`Settings`] into the narrower policy structs the execution layer
//! actually consumes, converting durations into each target's native unit.

use crate::behavior::settings::CommitLevel;
use crate::behavior::settings::ConsistencyAp;
use crate::behavior::settings::ConsistencyCp;
use crate::behavior::settings::ReplicaOrder;
use crate::behavior::settings::Settings;

/// The read path's policy: everything needed to issue and retry a single-key or batched read.
#[derive(Clone, Copy, Debug)]
pub struct ReadPolicy {
	/// Per-attempt socket timeout, in milliseconds.
	pub timeout_millis: u64,
	/// Overall timeout across every attempt, in milliseconds.
	pub total_timeout_millis: u64,
	/// `max_attempts - 1`, clamped to be non-negative.
	pub max_retries: u32,
	/// Replica selection order.
	pub replica_order: ReplicaOrder,
	/// AP consistency guarantee.
	pub consistency_ap: ConsistencyAp,
	/// CP consistency guarantee.
	pub consistency_cp: ConsistencyCp,
	/// Touch-on-read TTL percent threshold.
	pub touch_ttl_percent: u32,
}

/// The write path's policy.
#[derive(Clone, Copy, Debug)]
pub struct WritePolicy {
	/// Per-attempt socket timeout, in milliseconds.
	pub timeout_millis: u64,
	/// `max_attempts - 1`, clamped to be non-negative.
	pub max_retries: u32,
	/// Base backoff between retries, in milliseconds.
	pub retry_backoff_millis: u64,
	/// Whether the user key is sent alongside the digest.
	pub send_key: bool,
	/// Whether the wire payload is compressed.
	pub compression: bool,
	/// Whether deletes are immediately durable.
	pub durable_delete: bool,
	/// Commit acknowledgement level.
	pub commit_level: CommitLevel,
}

/// The batch path's policy, layered on top of [`WritePolicy`]/[`ReadPolicy`] concerns common to
/// every op in the batch.
#[derive(Clone, Copy, Debug)]
pub struct BatchPolicy {
	/// Maximum concurrent sub-requests within the batch call.
	pub concurrency: u32,
	/// Whether small values may be inlined.
	pub allow_inline: bool,
	/// Whether inlining is additionally allowed on SSD-backed namespaces.
	pub allow_inline_ssd: bool,
	/// `max_attempts - 1`, clamped to be non-negative.
	pub max_retries: u32,
	/// Per-attempt socket timeout, in milliseconds.
	pub timeout_millis: u64,
}

/// The query path's policy.
#[derive(Clone, Copy, Debug)]
pub struct QueryPolicy {
	/// Depth of the client-side result queue.
	pub queue_size: u32,
	/// Per-attempt socket timeout, in milliseconds.
	pub timeout_millis: u64,
	/// `max_attempts - 1`, clamped to be non-negative.
	pub max_retries: u32,
}

fn max_retries(settings: &Settings) -> u32 {
	settings.max_attempts.saturating_sub(1)
}

/// Projects `settings` into a [`ReadPolicy`].
pub fn as_read_policy(settings: &Settings) -> ReadPolicy {
	ReadPolicy {
		timeout_millis: settings.timeout_per_attempt.as_millis() as u64,
		total_timeout_millis: settings.timeout_total.as_millis() as u64,
		max_retries: max_retries(settings),
		replica_order: settings.replica_order,
		consistency_ap: settings.read_consistency_ap,
		consistency_cp: settings.read_consistency_cp,
		touch_ttl_percent: settings.touch_ttl_percent,
	}
}

/// Projects `settings` into a [`WritePolicy`].
pub fn as_write_policy(settings: &Settings) -> WritePolicy {
	WritePolicy {
		timeout_millis: settings.timeout_per_attempt.as_millis() as u64,
		max_retries: max_retries(settings),
		retry_backoff_millis: settings.retry_backoff.as_millis() as u64,
		send_key: settings.send_key,
		compression: settings.compression,
		durable_delete: settings.durable_delete,
		commit_level: settings.commit_level,
	}
}

/// Projects `settings` into a [`BatchPolicy`].
pub fn as_batch_policy(settings: &Settings) -> BatchPolicy {
	BatchPolicy {
		concurrency: settings.batch_concurrency,
		allow_inline: settings.batch_allow_inline,
		allow_inline_ssd: settings.batch_allow_inline_ssd,
		max_retries: max_retries(settings),
		timeout_millis: settings.timeout_per_attempt.as_millis() as u64,
	}
}

/// Projects `settings` into a [`QueryPolicy`].
pub fn as_query_policy(settings: &Settings) -> QueryPolicy {
	QueryPolicy {
		queue_size: settings.query_queue_size,
		timeout_millis: settings.timeout_per_attempt.as_millis() as u64,
		max_retries: max_retries(settings),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn max_retries_is_attempts_minus_one_clamped() {
		let mut settings = Settings::baseline();
		settings.max_attempts = 0;
		assert_eq!(max_retries(&settings), 0);
		settings.max_attempts = 5;
		assert_eq!(max_retries(&settings), 4);
	}

	#[test]
	fn read_policy_converts_durations_to_millis() {
		let mut settings = Settings::baseline();
		settings.timeout_per_attempt = std::time::Duration::from_secs(2);
		let policy = as_read_policy(&settings);
		assert_eq!(policy.timeout_millis, 2_000);
	}
}
