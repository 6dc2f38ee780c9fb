use async_trait::async_trait;
use fluentkv::exec::{execute, ExecutionMode, InclusionPolicy, KeyCall, Work};
use fluentkv::Error;
use fluentkv::session::{Session, TransactionToken};
use fluentkv::stream::{Outcome, RecordKey};
use futures::StreamExt;
use std::sync::Arc;

/// A session that always reports the node holding a serialized JSON blob for any key.
struct SingleNodeSession;

#[async_trait]
impl Session for SingleNodeSession {
	fn transaction(&self) -> Option<TransactionToken> {
		None
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

	let session: Arc<dyn Session> = Arc::new(SingleNodeSession);
	let call = KeyCall {
		key: RecordKey("account:jaime".into()),
		node: "node-1".into(),
		request: br#"{"balance": 125}"#.to_vec(),
		decode: Arc::new(|bytes| Ok(Outcome::Record(serde_json::from_slice(&bytes)?))),
		filter: None,
	};
	let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };
	let mut view = execute(session, Work::PerKey(vec![call]), inclusion, ExecutionMode::Synchronous).await;

	while let Some(event) = view.next().await {
		println!("{:?}", event.expect("stream error"));
	}
}
