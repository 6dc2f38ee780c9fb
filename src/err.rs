use serde::Deserialize;
use serde::Serialize;
use std::error;
use std::fmt;

/// Categories of errors returned by the client
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
	/// An expression combined operands of incompatible result types
	TypeError,
	/// An expression referenced a local variable that was never bound
	ScopeError,
	/// An `if`/`elif` chain was lowered without a terminating `else`
	IllFormedConditional,
	/// The behavior/system text configuration failed to parse or resolve
	ConfigError,
	/// A guarded update's precondition (generation, etc.) was not met
	PreconditionFailed,
	/// A per-key outcome was filtered out and `fail_on_filtered_out` was set
	FilteredOut,
	/// The underlying client invocation timed out
	Timeout,
	/// The underlying client invocation failed at the transport layer
	IoFailure,
	/// A retryable error that exhausted its attempt budget
	Transient,
	/// An [`crate::stream::AsyncRecordStream`] was driven past its terminal marker
	StreamError,
	/// An info-aggregation metric had no recognized merge rule on any node
	UnknownMetric,
	/// An argument was out of range or otherwise structurally invalid
	InvalidArgument,
	/// Deserialization error
	Deserialization,
	/// Serialization error
	Serialization,
	/// Internal invariant violation
	InternalError,
}

impl ErrorKind {
	/// Sets a message on an error kind
	pub fn with_message(self, message: impl Into<String>) -> Error {
		Error {
			kind: self,
			message: message.into(),
			in_doubt: false,
		}
	}

	/// Constructs an error from an error kind and context
	pub fn with_context(self, context: impl fmt::Display) -> Error {
		let message = match self {
			ErrorKind::TypeError => format!("type error; {context}"),
			ErrorKind::ScopeError => format!("undefined variable; {context}"),
			ErrorKind::ConfigError => format!("configuration error; {context}"),
			ErrorKind::PreconditionFailed => format!("precondition failed; {context}"),
			ErrorKind::UnknownMetric => format!("unknown metric; {context}"),
			_ => context.to_string(),
		};
		Error {
			kind: self,
			message,
			in_doubt: false,
		}
	}

	/// Marks the constructed error as in-doubt: the server may or may not have applied the
	/// operation before the failure was observed. Only meaningful for [`ErrorKind::Timeout`] and
	/// [`ErrorKind::IoFailure`].
	pub fn in_doubt(self, message: impl Into<String>) -> Error {
		Error {
			kind: self,
			message: message.into(),
			in_doubt: true,
		}
	}
}

/// Error type returned by the client
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Error {
	kind: ErrorKind,
	message: String,
	in_doubt: bool,
}

impl Error {
	/// Returns the kind of an error
	pub const fn kind(&self) -> ErrorKind {
		self.kind
	}

	/// Whether the server may have applied the operation despite this error being raised.
	/// Only ever `true` for [`ErrorKind::Timeout`] and [`ErrorKind::IoFailure`].
	pub const fn is_in_doubt(&self) -> bool {
		self.in_doubt
	}
}

impl error::Error for Error {}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.message)
	}
}

impl From<std::io::Error> for Error {
	fn from(error: std::io::Error) -> Self {
		ErrorKind::IoFailure.with_context(error)
	}
}

impl From<toml::de::Error> for Error {
	fn from(error: toml::de::Error) -> Self {
		ErrorKind::ConfigError.with_context(error)
	}
}

impl From<notify::Error> for Error {
	fn from(error: notify::Error) -> Self {
		ErrorKind::IoFailure.with_context(error)
	}
}

impl From<serde_json::Error> for Error {
	fn from(error: serde_json::Error) -> Self {
		ErrorKind::Deserialization.with_context(error)
	}
}

impl<T> From<flume::SendError<T>> for Error {
	fn from(error: flume::SendError<T>) -> Self {
		ErrorKind::InternalError.with_context(error)
	}
}

impl From<flume::RecvError> for Error {
	fn from(error: flume::RecvError) -> Self {
		ErrorKind::InternalError.with_context(error)
	}
}
