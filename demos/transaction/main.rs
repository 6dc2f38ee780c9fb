use async_trait::async_trait;
use fluentkv::exec::{execute, ExecutionMode, InclusionPolicy, KeyCall, Work};
use fluentkv::session::{Session, TransactionToken};
use fluentkv::stream::{Outcome, RecordKey};
use fluentkv::Error;
use futures::StreamExt;
use std::sync::Arc;

/// A session bound to an open transaction. Running it asynchronously logs a warning rather than
/// refusing the call; every operation in the unit of work must still complete before commit.
struct TransactionalSession(TransactionToken);

#[async_trait]
impl Session for TransactionalSession {
	fn transaction(&self) -> Option<TransactionToken> {
		Some(self.0)
	}

	fn nodes(&self) -> Vec<String> {
		vec!["node-1".into()]
	}

	async fn invoke(&self, _node: &str, request: Vec<u8>) -> Result<Vec<u8>, Error> {
		Ok(request)
	}
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt::init();

	let session: Arc<dyn Session> = Arc::new(TransactionalSession(TransactionToken(42)));
	let call = KeyCall {
		key: RecordKey("order:1".into()),
		node: "node-1".into(),
		request: b"reserved".to_vec(),
		decode: Arc::new(|bytes| Ok(Outcome::Record(serde_json::json!(String::from_utf8_lossy(&bytes).to_string())))),
		filter: None,
	};
	let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };

	// Logs a warning (open transaction + async execution) and proceeds anyway.
	let mut view = execute(session, Work::PerKey(vec![call]), inclusion, ExecutionMode::Asynchronous).await;
	while let Some(event) = view.next().await {
		println!("{:?}", event.expect("stream error"));
	}
}
