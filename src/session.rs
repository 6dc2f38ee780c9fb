//! The session boundary: everything the execution and info-aggregation layers need from their
//! host, consumed but never constructed by the core.

use crate::err::Error;
use async_trait::async_trait;

/// A transaction token threading a logical unit of work through every per-operation policy. Two
/// tokens are equal iff they denote the same open transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TransactionToken(
	/// The opaque token value; equality is the only meaningful operation on it.
	pub u64,
);

/// What the execution and info-aggregation layers require from their host: the transaction (if
/// any) presently open, the set of cluster nodes, and an escape hatch to actually talk to a node.
///
/// The core never interprets `invoke`'s payload; wire encoding and decoding are entirely the
/// host's concern (see the Backend protocol note in the crate's design notes). A `Session` is
/// handed in per call, not owned by any core type.
#[async_trait]
pub trait Session: Send + Sync {
	/// The transaction token presently open on this session, or `None` outside a transaction.
	fn transaction(&self) -> Option<TransactionToken>;

	/// The cluster nodes currently known to this session, used by info aggregation to fan out
	/// per-node metric collection.
	fn nodes(&self) -> Vec<String>;

	/// Issues `request` against `node` and returns its raw response bytes.
	async fn invoke(&self, node: &str, request: Vec<u8>) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use std::sync::Mutex;

	/// An in-memory [`Session`] double: `invoke` returns a canned response (or error) per node,
	/// recording every call it receives for assertions.
	pub(crate) struct FakeSession {
		pub transaction: Option<TransactionToken>,
		pub nodes: Vec<String>,
		pub responses: Mutex<std::collections::HashMap<String, Result<Vec<u8>, String>>>,
		pub calls: Mutex<Vec<(String, Vec<u8>)>>,
	}

	impl FakeSession {
		pub fn new(nodes: Vec<String>) -> Self {
			FakeSession { transaction: None, nodes, responses: Mutex::new(std::collections::HashMap::new()), calls: Mutex::new(Vec::new()) }
		}

		pub fn with_response(self, node: &str, response: Vec<u8>) -> Self {
			self.responses.lock().unwrap().insert(node.to_string(), Ok(response));
			self
		}

		pub fn call_count(&self) -> usize {
			self.calls.lock().unwrap().len()
		}
	}

	#[async_trait]
	impl Session for FakeSession {
		fn transaction(&self) -> Option<TransactionToken> {
			self.transaction
		}

		fn nodes(&self) -> Vec<String> {
			self.nodes.clone()
		}

		async fn invoke(&self, node: &str, request: Vec<u8>) -> Result<Vec<u8>, Error> {
			self.calls.lock().unwrap().push((node.to_string(), request));
			match self.responses.lock().unwrap().get(node) {
				Some(Ok(bytes)) => Ok(bytes.clone()),
				Some(Err(message)) => Err(crate::err::ErrorKind::IoFailure.with_message(message.clone())),
				None => Ok(Vec::new()),
			}
		}
	}
}
