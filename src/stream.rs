//! Bounded, push-based record stream with backpressure.
//!
//! A single [`AsyncRecordStream`] is shared between one or more producer tasks (the executor's
//! fan-out workers) and exactly one consumer. Producers call [`AsyncRecordStream::publish`] for
//! each per-key outcome; the consumer drains the stream with [`AsyncRecordStream::recv`] or the
//! [`futures::Stream`] view returned by [`AsyncRecordStream::into_stream`].
//!
//! The terminal marker (`END` or `ERR`) is never subject to the bounded capacity: it lives in a
//! dedicated slot outside the item queue, so [`AsyncRecordStream::complete`],
//! [`AsyncRecordStream::error`] and [`AsyncRecordStream::close`] never block.

use crate::err::Error;
use crate::err::ErrorKind;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

/// How long `publish` waits on a full queue before re-checking cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The key a [`RecordEvent`] is reporting on. Kept deliberately opaque: the object-to-record
/// mapping facade that produces and interprets it is an external collaborator.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct RecordKey(
	/// The opaque key value.
	pub String,
);

impl fmt::Display for RecordKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The per-key outcome carried by a [`RecordEvent`].
#[derive(Clone, Debug)]
pub enum Outcome {
	/// The key was found and the opaque record payload is attached.
	Record(serde_json::Value),
	/// The key was not present on the server.
	Miss,
	/// The record was found but excluded by a compiled filter expression.
	FilteredOut,
	/// The operation failed for this key specifically (e.g. precondition failed).
	Error(Error),
}

/// A single per-key result flowing from an executor worker to the stream's consumer.
#[derive(Clone, Debug)]
pub struct RecordEvent {
	/// The key this event reports on.
	pub key: RecordKey,
	/// The position of this key in the original request list, used to reassemble order for
	/// unordered parallel fan-out.
	pub index: usize,
	/// What happened for this key.
	pub outcome: Outcome,
}

#[derive(Clone)]
enum Terminal {
	End,
	Err(Error),
}

#[repr(u8)]
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum State {
	Open = 0,
	Completed = 1,
	Errored = 2,
	Closed = 3,
}

impl State {
	fn from_u8(v: u8) -> Self {
		match v {
			0 => State::Open,
			1 => State::Completed,
			2 => State::Errored,
			_ => State::Closed,
		}
	}
}

struct Inner {
	items_tx: flume::Sender<RecordEvent>,
	items_rx: flume::Receiver<RecordEvent>,
	state: AtomicU8,
	terminal: Mutex<Option<Terminal>>,
	notify: tokio::sync::Notify,
}

/// A bounded, single-producer/multi-consumer (in practice: multi-producer/single-consumer)
/// channel of [`RecordEvent`]s with a reserved terminal slot.
///
/// Cloning an `AsyncRecordStream` shares the same underlying queue and state; every clone is a
/// producer handle. Use [`AsyncRecordStream::into_stream`] once, from the consumer side, to get a
/// [`futures::Stream`] view.
#[derive(Clone)]
pub struct AsyncRecordStream {
	inner: Arc<Inner>,
}

impl fmt::Debug for AsyncRecordStream {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AsyncRecordStream")
			.field("state", &State::from_u8(self.inner.state.load(Ordering::SeqCst)))
			.field("capacity", &self.inner.items_tx.capacity())
			.finish()
	}
}

impl AsyncRecordStream {
	/// Creates a new stream with the given bounded capacity. Capacity must be at least 1;
	/// a capacity of 0 is promoted to 1 so that a single publish/complete/consume sequence never
	/// deadlocks (see the `capacity_one_regression` test).
	pub fn bounded(capacity: usize) -> Self {
		let capacity = capacity.max(1);
		let (items_tx, items_rx) = flume::bounded(capacity);
		Self {
			inner: Arc::new(Inner {
				items_tx,
				items_rx,
				state: AtomicU8::new(State::Open as u8),
				terminal: Mutex::new(None),
				notify: tokio::sync::Notify::new(),
			}),
		}
	}

	fn state(&self) -> State {
		State::from_u8(self.inner.state.load(Ordering::SeqCst))
	}

	/// `true` iff the stream is closed or completed; producers must consult this before issuing
	/// new I/O and abandon in-flight fan-out once it flips.
	pub fn cancelled(&self) -> bool {
		matches!(self.state(), State::Closed | State::Completed)
	}

	/// Publishes one event, blocking while the queue is full and the stream is still open.
	/// Returns immediately without enqueueing if the stream is closed or completed.
	pub async fn publish(&self, event: RecordEvent) {
		if self.state() != State::Open {
			return;
		}
		let send_fut = self.inner.items_tx.send_async(event);
		tokio::pin!(send_fut);
		loop {
			tokio::select! {
				res = &mut send_fut => {
					let _ = res;
					return;
				}
				_ = tokio::time::sleep(POLL_INTERVAL) => {
					if self.state() != State::Open {
						return;
					}
				}
			}
		}
	}

	/// Idempotently moves `Open -> Completed`, unblocking a waiting consumer with `END`.
	pub fn complete(&self) {
		if self
			.inner
			.state
			.compare_exchange(State::Open as u8, State::Completed as u8, Ordering::SeqCst, Ordering::SeqCst)
			.is_ok()
		{
			*self.inner.terminal.lock().expect("terminal mutex poisoned") = Some(Terminal::End);
			self.inner.notify.notify_waiters();
		}
	}

	/// Idempotently moves `Open -> Errored`, unblocking a waiting consumer with `ERR`. A missing
	/// cause is normalized to a generic error kind. Ignored once the stream is no longer `Open`.
	pub fn error(&self, cause: Option<Error>) {
		if self
			.inner
			.state
			.compare_exchange(State::Open as u8, State::Errored as u8, Ordering::SeqCst, Ordering::SeqCst)
			.is_ok()
		{
			let cause = cause.unwrap_or_else(|| ErrorKind::InternalError.with_message("stream error"));
			*self.inner.terminal.lock().expect("terminal mutex poisoned") = Some(Terminal::Err(cause));
			self.inner.notify.notify_waiters();
		}
	}

	/// Idempotently drains the queue, enqueues `END`, and moves the stream to `Closed` from any
	/// state. After this call no further events are ever delivered.
	pub fn close(&self) {
		self.inner.state.store(State::Closed as u8, Ordering::SeqCst);
		while self.inner.items_rx.try_recv().is_ok() {}
		*self.inner.terminal.lock().expect("terminal mutex poisoned") = Some(Terminal::End);
		self.inner.notify.notify_waiters();
	}

	/// Receives the next event. `Ok(Some(event))` for an item, `Ok(None)` once the terminal `END`
	/// has been observed, `Err(e)` exactly once for a terminal `ERR` (every subsequent call then
	/// behaves as `Ok(None)`, matching "observe the error on the next `next()`, then end").
	pub async fn recv(&self) -> Result<Option<RecordEvent>, Error> {
		loop {
			if let Ok(event) = self.inner.items_rx.try_recv() {
				return Ok(Some(event));
			}
			let terminal = self.inner.terminal.lock().expect("terminal mutex poisoned").clone();
			match terminal {
				Some(Terminal::End) => return Ok(None),
				Some(Terminal::Err(e)) => {
					*self.inner.terminal.lock().expect("terminal mutex poisoned") = Some(Terminal::End);
					return Err(e);
				}
				None => {}
			}
			let notified = self.inner.notify.notified();
			tokio::select! {
				item = self.inner.items_rx.recv_async() => {
					match item {
						Ok(event) => return Ok(Some(event)),
						Err(_) => continue,
					}
				}
				_ = notified => continue,
			}
		}
	}

	/// Converts this handle into a [`futures::Stream`] view. Dropping the view closes the
	/// underlying stream.
	pub fn into_stream(self) -> RecordStreamView {
		RecordStreamView {
			stream: self,
			pending: None,
		}
	}
}

/// A [`futures::Stream`] view over an [`AsyncRecordStream`]. Dropping it closes the stream.
pub struct RecordStreamView {
	stream: AsyncRecordStream,
	pending: Option<Pin<Box<dyn std::future::Future<Output = Result<Option<RecordEvent>, Error>> + Send>>>,
}

impl fmt::Debug for RecordStreamView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RecordStreamView").field("stream", &self.stream).field("pending", &self.pending.is_some()).finish()
	}
}

impl Drop for RecordStreamView {
	fn drop(&mut self) {
		self.stream.close();
	}
}

impl futures::Stream for RecordStreamView {
	type Item = Result<RecordEvent, Error>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		if this.pending.is_none() {
			let stream = this.stream.clone();
			this.pending = Some(Box::pin(async move { stream.recv().await }));
		}
		let fut = this.pending.as_mut().expect("just populated");
		match fut.as_mut().poll(cx) {
			Poll::Ready(result) => {
				this.pending = None;
				match result {
					Ok(Some(event)) => Poll::Ready(Some(Ok(event))),
					Ok(None) => Poll::Ready(None),
					Err(e) => Poll::Ready(Some(Err(e))),
				}
			}
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn event(index: usize) -> RecordEvent {
		RecordEvent {
			key: RecordKey(format!("k{index}")),
			index,
			outcome: Outcome::Record(serde_json::json!({ "n": index })),
		}
	}

	#[tokio::test]
	async fn capacity_one_regression() {
		let stream = AsyncRecordStream::bounded(1);
		stream.publish(event(0)).await;
		stream.complete();
		let first = stream.recv().await.unwrap();
		assert!(first.is_some());
		let second = stream.recv().await.unwrap();
		assert!(second.is_none());
	}

	#[tokio::test]
	async fn error_then_end() {
		let stream = AsyncRecordStream::bounded(4);
		stream.publish(event(0)).await;
		stream.error(Some(ErrorKind::Timeout.with_message("boom")));
		assert!(matches!(stream.recv().await, Ok(Some(_))));
		let err = stream.recv().await;
		assert!(err.is_err());
		let after = stream.recv().await.unwrap();
		assert!(after.is_none());
	}

	#[tokio::test]
	async fn publish_order_preserved_single_producer() {
		let stream = AsyncRecordStream::bounded(2);
		let producer = stream.clone();
		let handle = tokio::spawn(async move {
			for i in 0..5 {
				producer.publish(event(i)).await;
			}
			producer.complete();
		});
		let mut seen = Vec::new();
		while let Some(ev) = stream.recv().await.unwrap() {
			seen.push(ev.index);
		}
		handle.await.unwrap();
		assert_eq!(seen, vec![0, 1, 2, 3, 4]);
	}

	#[tokio::test]
	async fn complete_and_close_are_idempotent() {
		let stream = AsyncRecordStream::bounded(2);
		stream.complete();
		stream.complete();
		stream.close();
		stream.close();
		assert!(stream.cancelled());
		assert!(stream.recv().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn close_drops_buffered_items() {
		let stream = AsyncRecordStream::bounded(4);
		stream.publish(event(0)).await;
		stream.publish(event(1)).await;
		stream.close();
		assert!(stream.recv().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn publish_after_completion_is_a_no_op() {
		let stream = AsyncRecordStream::bounded(1);
		stream.complete();
		stream.publish(event(0)).await;
		assert!(stream.recv().await.unwrap().is_none());
	}
}
