use async_trait::async_trait;
use fluentkv::exec::{execute, ExecutionMode, InclusionPolicy, KeyCall, Work};
use fluentkv::stream::{Outcome, RecordKey};
use fluentkv::session::Session;
use fluentkv::Error;
use futures::StreamExt;
use std::sync::Arc;

struct EchoSession;

#[async_trait]
impl Session for EchoSession {
	fn transaction(&self) -> Option<fluentkv::session::TransactionToken> {
		None
	}

	fn nodes(&self) -> Vec<String> {
		vec!["node-1".into(), "node-2".into()]
	}

	async fn invoke(&self, _node: &str, request: Vec<u8>) -> Result<Vec<u8>, Error> {
		Ok(request)
	}
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt::init();

	let session: Arc<dyn Session> = Arc::new(EchoSession);
	let calls = (0..5)
		.map(|i| KeyCall {
			key: RecordKey(format!("item:{i}")),
			node: if i % 2 == 0 { "node-1" } else { "node-2" }.into(),
			request: i.to_string().into_bytes(),
			decode: Arc::new(|bytes| Ok(Outcome::Record(serde_json::json!(String::from_utf8_lossy(&bytes).to_string())))),
			filter: None,
		})
		.collect();

	let inclusion = InclusionPolicy { respond_all_keys: true, fail_on_filtered_out: false };
	let mut view = execute(session, Work::PerKey(calls), inclusion, ExecutionMode::Synchronous).await;

	let mut events = Vec::new();
	while let Some(event) = view.next().await {
		events.push(event.expect("stream error"));
	}
	events.sort_by_key(|event| event.index);
	for event in events {
		println!("{}: {:?}", event.key, event.outcome);
	}
}
