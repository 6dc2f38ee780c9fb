//! Per-call policy checks that fall outside the behavior matrix: TTL sentinel resolution,
//! deadline validation, and optimistic-concurrency generation checks.

use crate::err::Error;
use crate::err::ErrorKind;
use std::time::SystemTime;

/// Leave the record's expiration exactly as the server's namespace default dictates.
pub const TTL_SERVER_DEFAULT: i64 = 0;
/// The record never expires.
pub const TTL_NEVER_EXPIRE: i64 = -1;
/// Leave the record's current expiration untouched (no-op on TTL).
pub const TTL_DONT_CHANGE: i64 = -2;

/// Resolves the effective TTL for a write: the first non-zero of (per-record override, per-batch
/// override), else [`TTL_SERVER_DEFAULT`]. Zero is itself a meaningful sentinel — "use the
/// server's namespace default" — not an absence marker, so `Some(0)` falls through just as `None`
/// does.
pub fn resolve_ttl(per_record: Option<i64>, per_batch: Option<i64>) -> i64 {
	match per_record {
		Some(ttl) if ttl != 0 => ttl,
		_ => per_batch.unwrap_or(TTL_SERVER_DEFAULT),
	}
}

/// Rejects a deadline that has already passed at the moment of the call.
pub fn validate_deadline(deadline: SystemTime) -> Result<(), Error> {
	if deadline <= SystemTime::now() {
		return Err(ErrorKind::InvalidArgument.with_context("deadline is in the past"));
	}
	Ok(())
}

/// Checks an optimistic-concurrency precondition: if the caller supplied an expected generation,
/// it must match the record's actual generation exactly.
pub fn check_generation(expected: Option<u32>, actual: u32) -> Result<(), Error> {
	match expected {
		Some(expected) if expected != actual => {
			Err(ErrorKind::PreconditionFailed.with_context(format!("expected generation {expected}, found {actual}")))
		}
		_ => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[test]
	fn ttl_prefers_per_record_over_per_batch_over_default() {
		assert_eq!(resolve_ttl(Some(30), Some(60)), 30);
		assert_eq!(resolve_ttl(None, Some(60)), 60);
		assert_eq!(resolve_ttl(None, None), TTL_SERVER_DEFAULT);
		assert_eq!(resolve_ttl(Some(TTL_NEVER_EXPIRE), None), TTL_NEVER_EXPIRE);
	}

	#[test]
	fn ttl_falls_through_a_zero_per_record_sentinel_to_per_batch() {
		assert_eq!(resolve_ttl(Some(0), Some(3600)), 3600);
		assert_eq!(resolve_ttl(Some(0), None), TTL_SERVER_DEFAULT);
	}

	#[test]
	fn deadline_in_the_past_is_rejected() {
		let past = SystemTime::now() - Duration::from_secs(1);
		assert_eq!(validate_deadline(past).unwrap_err().kind(), ErrorKind::InvalidArgument);
	}

	#[test]
	fn deadline_in_the_future_is_accepted() {
		let future = SystemTime::now() + Duration::from_secs(60);
		assert!(validate_deadline(future).is_ok());
	}

	#[test]
	fn generation_mismatch_is_precondition_failed() {
		assert!(check_generation(Some(3), 3).is_ok());
		assert!(check_generation(None, 3).is_ok());
		assert_eq!(check_generation(Some(2), 3).unwrap_err().kind(), ErrorKind::PreconditionFailed);
	}
}
