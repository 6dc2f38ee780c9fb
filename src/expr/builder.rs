//! Typed, fluent builders over the [`crate::expr::node::Node`] tree.
//!
//! Every method returns a fresh, immutable node; chaining reads left-to-right *as written*, not
//! by mathematical precedence — `age.add(3).mul(4)` lowers as `(age + 3) * 4`. Nest literal
//! builders to get algebraic precedence.

use crate::err::Error;
use crate::err::ErrorKind;
use crate::expr::node::ArithOp;
use crate::expr::node::CmpOp;
use crate::expr::node::ConvertKind;
use crate::expr::node::LiteralValue;
use crate::expr::node::LogicOp;
use crate::expr::node::Node;
use crate::expr::node::ResultType;
use std::sync::Arc;

macro_rules! typed_expr {
	($name:ident, $ty:expr) => {
		/// A statically-typed expression node.
		#[derive(Clone, Debug)]
		pub struct $name(pub(crate) Arc<Node>);

		impl $name {
			fn from_node(node: Node) -> Self {
				Self(Arc::new(node))
			}

			/// Erases the static type, for use in contexts (if/else branches, let bodies) that
			/// only know the result type at lowering time.
			pub fn erase(self) -> AnyExpr {
				AnyExpr(self.0)
			}
		}

		impl From<$name> for AnyExpr {
			fn from(value: $name) -> Self {
				value.erase()
			}
		}
	};
}

typed_expr!(IntExpr, ResultType::Int);
typed_expr!(FloatExpr, ResultType::Float);
typed_expr!(StrExpr, ResultType::Str);
typed_expr!(BoolExpr, ResultType::Bool);
typed_expr!(BlobExpr, ResultType::Blob);

/// A type-erased expression, produced by [`IntExpr::erase`] and friends. Used where the concrete
/// result type is only known once the tree is complete (if/else branches, let bodies, var refs).
#[derive(Clone, Debug)]
pub struct AnyExpr(pub(crate) Arc<Node>);

impl AnyExpr {
	pub(crate) fn node(&self) -> &Arc<Node> {
		&self.0
	}

	/// The statically-tracked result type of the underlying node.
	pub fn result_type(&self) -> ResultType {
		self.0.result_type()
	}
}

fn typed_arith(op: ArithOp, left: Arc<Node>, right: Arc<Node>, ty: ResultType) -> Node {
	Node::Arith { op, left, right, ty }
}

fn typed_cmp(op: CmpOp, left: Arc<Node>, right: Arc<Node>) -> Node {
	Node::Cmp { op, left, right }
}

/// A bin reference of type `Int`.
pub fn int_bin(name: impl Into<String>) -> IntExpr {
	IntExpr::from_node(Node::BinRef { ty: ResultType::Int, name: name.into() })
}

/// A bin reference of type `Float`.
pub fn float_bin(name: impl Into<String>) -> FloatExpr {
	FloatExpr::from_node(Node::BinRef { ty: ResultType::Float, name: name.into() })
}

/// A bin reference of type `Str`.
pub fn str_bin(name: impl Into<String>) -> StrExpr {
	StrExpr::from_node(Node::BinRef { ty: ResultType::Str, name: name.into() })
}

/// A bin reference of type `Bool`.
pub fn bool_bin(name: impl Into<String>) -> BoolExpr {
	BoolExpr::from_node(Node::BinRef { ty: ResultType::Bool, name: name.into() })
}

/// A bin reference of type `Blob`.
pub fn blob_bin(name: impl Into<String>) -> BlobExpr {
	BlobExpr::from_node(Node::BinRef { ty: ResultType::Blob, name: name.into() })
}

impl From<i32> for IntExpr {
	fn from(v: i32) -> Self {
		IntExpr::from_node(Node::Literal { value: LiteralValue::Int(v as i64), ty: ResultType::Int })
	}
}

impl From<i64> for IntExpr {
	fn from(v: i64) -> Self {
		IntExpr::from_node(Node::Literal { value: LiteralValue::Int(v), ty: ResultType::Int })
	}
}

impl From<f32> for FloatExpr {
	fn from(v: f32) -> Self {
		FloatExpr::from_node(Node::Literal { value: LiteralValue::Float(v as f64), ty: ResultType::Float })
	}
}

impl From<f64> for FloatExpr {
	fn from(v: f64) -> Self {
		FloatExpr::from_node(Node::Literal { value: LiteralValue::Float(v), ty: ResultType::Float })
	}
}

impl From<&str> for StrExpr {
	fn from(v: &str) -> Self {
		StrExpr::from_node(Node::Literal { value: LiteralValue::Str(v.to_owned()), ty: ResultType::Str })
	}
}

impl From<String> for StrExpr {
	fn from(v: String) -> Self {
		StrExpr::from_node(Node::Literal { value: LiteralValue::Str(v), ty: ResultType::Str })
	}
}

impl From<bool> for BoolExpr {
	fn from(v: bool) -> Self {
		BoolExpr::from_node(Node::Literal { value: LiteralValue::Bool(v), ty: ResultType::Bool })
	}
}

impl From<Vec<u8>> for BlobExpr {
	fn from(v: Vec<u8>) -> Self {
		BlobExpr::from_node(Node::Literal { value: LiteralValue::Blob(v), ty: ResultType::Blob })
	}
}

macro_rules! numeric_ops {
	($ty:ident, $rt:expr) => {
		impl $ty {
			/// `self + rhs`.
			pub fn add(self, rhs: impl Into<$ty>) -> $ty {
				$ty::from_node(typed_arith(ArithOp::Add, self.0, rhs.into().0, $rt))
			}
			/// `self - rhs`.
			pub fn sub(self, rhs: impl Into<$ty>) -> $ty {
				$ty::from_node(typed_arith(ArithOp::Sub, self.0, rhs.into().0, $rt))
			}
			/// `self * rhs`.
			pub fn mul(self, rhs: impl Into<$ty>) -> $ty {
				$ty::from_node(typed_arith(ArithOp::Mul, self.0, rhs.into().0, $rt))
			}
			/// `self / rhs`. Division by a literal zero lowers normally.
			pub fn div(self, rhs: impl Into<$ty>) -> $ty {
				$ty::from_node(typed_arith(ArithOp::Div, self.0, rhs.into().0, $rt))
			}
			/// `self == rhs`.
			pub fn eq(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Eq, self.0, rhs.into().0))
			}
			/// `self != rhs`.
			pub fn ne(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Ne, self.0, rhs.into().0))
			}
			/// `self < rhs`.
			pub fn lt(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Lt, self.0, rhs.into().0))
			}
			/// `self <= rhs`.
			pub fn le(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Le, self.0, rhs.into().0))
			}
			/// `self > rhs`.
			pub fn gt(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Gt, self.0, rhs.into().0))
			}
			/// `self >= rhs`.
			pub fn gte(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Ge, self.0, rhs.into().0))
			}
			/// `lo <= self <= hi`.
			pub fn between(self, lo: impl Into<$ty>, hi: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(Node::Between { value: self.0, low: lo.into().0, high: hi.into().0 })
			}
		}
	};
}

numeric_ops!(IntExpr, ResultType::Int);
numeric_ops!(FloatExpr, ResultType::Float);

macro_rules! ordered_ops {
	($ty:ident) => {
		impl $ty {
			/// `self == rhs`.
			pub fn eq(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Eq, self.0, rhs.into().0))
			}
			/// `self != rhs`.
			pub fn ne(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Ne, self.0, rhs.into().0))
			}
			/// `self < rhs`, lexicographic for `Str`.
			pub fn lt(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Lt, self.0, rhs.into().0))
			}
			/// `self <= rhs`, lexicographic for `Str`.
			pub fn le(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Le, self.0, rhs.into().0))
			}
			/// `self > rhs`, lexicographic for `Str`.
			pub fn gt(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Gt, self.0, rhs.into().0))
			}
			/// `self >= rhs`, lexicographic for `Str`.
			pub fn gte(self, rhs: impl Into<$ty>) -> BoolExpr {
				BoolExpr::from_node(typed_cmp(CmpOp::Ge, self.0, rhs.into().0))
			}
		}
	};
}

ordered_ops!(StrExpr);

impl BlobExpr {
	/// `self == rhs`.
	pub fn eq(self, rhs: impl Into<BlobExpr>) -> BoolExpr {
		BoolExpr::from_node(typed_cmp(CmpOp::Eq, self.0, rhs.into().0))
	}
	/// `self != rhs`.
	pub fn ne(self, rhs: impl Into<BlobExpr>) -> BoolExpr {
		BoolExpr::from_node(typed_cmp(CmpOp::Ne, self.0, rhs.into().0))
	}
}

impl BoolExpr {
	/// `self == rhs`.
	pub fn eq(self, rhs: impl Into<BoolExpr>) -> BoolExpr {
		BoolExpr::from_node(typed_cmp(CmpOp::Eq, self.0, rhs.into().0))
	}
	/// `self != rhs`.
	pub fn ne(self, rhs: impl Into<BoolExpr>) -> BoolExpr {
		BoolExpr::from_node(typed_cmp(CmpOp::Ne, self.0, rhs.into().0))
	}
	/// Short-circuit `self AND rhs`.
	pub fn and(self, rhs: impl Into<BoolExpr>) -> BoolExpr {
		BoolExpr::from_node(Node::Logic { op: LogicOp::And, operands: vec![self.0, rhs.into().0] })
	}
	/// Short-circuit `self OR rhs`.
	pub fn or(self, rhs: impl Into<BoolExpr>) -> BoolExpr {
		BoolExpr::from_node(Node::Logic { op: LogicOp::Or, operands: vec![self.0, rhs.into().0] })
	}
	/// `NOT self`.
	pub fn not(self) -> BoolExpr {
		BoolExpr::from_node(Node::Logic { op: LogicOp::Not, operands: vec![self.0] })
	}
}

impl IntExpr {
	/// Explicit `Int -> Float` conversion.
	pub fn to_float(self) -> FloatExpr {
		FloatExpr::from_node(Node::Convert { kind: ConvertKind::ToFloat, inner: self.0, ty: ResultType::Float })
	}
}

impl FloatExpr {
	/// Explicit `Float -> Int` conversion, truncating toward zero.
	pub fn to_int(self) -> IntExpr {
		IntExpr::from_node(Node::Convert { kind: ConvertKind::ToInt, inner: self.0, ty: ResultType::Int })
	}
}

/// Starts an `if`/`elif`*/`else` chain. The type system only exposes `.elif()` and `.else_()` on
/// the returned builder, so a chain cannot be finished without a terminating `else` — "ill-formed
/// conditional" is therefore unreachable through this surface; [`crate::expr::lower`] still
/// checks it defensively for anyone assembling a [`Node::If`] directly.
pub fn if_(cond: BoolExpr, then: impl Into<AnyExpr>) -> IfBuilder {
	IfBuilder {
		branches: vec![(cond.0, then.into().0)],
	}
}

/// Builder returned by [`if_`]; see its documentation.
#[derive(Debug)]
pub struct IfBuilder {
	branches: Vec<(Arc<Node>, Arc<Node>)>,
}

impl IfBuilder {
	/// Adds another `elif` branch.
	#[must_use]
	pub fn elif(mut self, cond: BoolExpr, then: impl Into<AnyExpr>) -> Self {
		self.branches.push((cond.0, then.into().0));
		self
	}

	/// Terminates the chain with an unconditional `else` branch.
	pub fn else_(self, value: impl Into<AnyExpr>) -> AnyExpr {
		AnyExpr(Arc::new(Node::If {
			branches: self.branches,
			else_branch: Some(value.into().0),
		}))
	}
}

/// Starts a scoped local-variable block: `define(name).as(expr)[.and(name).as(expr)]*.then(body)`.
pub fn define(name: impl Into<String>) -> LetBuilder {
	LetBuilder {
		bindings: Vec::new(),
		pending_name: Some(name.into()),
	}
}

/// Builder returned by [`define`]; see its documentation.
#[derive(Debug)]
pub struct LetBuilder {
	bindings: Vec<(String, Arc<Node>)>,
	pending_name: Option<String>,
}

impl LetBuilder {
	/// Supplies the value expression for the most recently named binding.
	pub fn as_(mut self, value: impl Into<AnyExpr>) -> Self {
		let name = self.pending_name.take().expect("as_ called without a pending binding name");
		self.bindings.push((name, value.into().0));
		self
	}

	/// Names the next binding; must be followed by `.as_(value)`.
	#[must_use]
	pub fn and(mut self, name: impl Into<String>) -> Self {
		self.pending_name = Some(name.into());
		self
	}

	/// Terminates the block, evaluating `body` in the scope of every binding declared so far.
	/// Scope resolution (does every `var_*` reference a bound name of a matching type?) happens
	/// at lowering time, per spec.
	pub fn then(self, body: impl Into<AnyExpr>) -> AnyExpr {
		AnyExpr(Arc::new(Node::LetIn {
			bindings: self.bindings,
			body: body.into().0,
		}))
	}
}

/// References a local variable bound by an enclosing [`define`] block, asserting it has type
/// `Int`. Unresolved names, or names bound to a different type, are a lowering error.
pub fn var_int(name: impl Into<String>) -> IntExpr {
	IntExpr::from_node(Node::VarRef { name: name.into(), ty: ResultType::Int })
}

/// Like [`var_int`] but asserting type `Float`.
pub fn var_float(name: impl Into<String>) -> FloatExpr {
	FloatExpr::from_node(Node::VarRef { name: name.into(), ty: ResultType::Float })
}

/// Like [`var_int`] but asserting type `Str`.
pub fn var_str(name: impl Into<String>) -> StrExpr {
	StrExpr::from_node(Node::VarRef { name: name.into(), ty: ResultType::Str })
}

/// Like [`var_int`] but asserting type `Bool`.
pub fn var_bool(name: impl Into<String>) -> BoolExpr {
	BoolExpr::from_node(Node::VarRef { name: name.into(), ty: ResultType::Bool })
}

/// Like [`var_int`] but asserting type `Blob`.
pub fn var_blob(name: impl Into<String>) -> BlobExpr {
	BlobExpr::from_node(Node::VarRef { name: name.into(), ty: ResultType::Blob })
}

/// Convenience for callers that already hold an [`AnyExpr`] and want a typed error when it turns
/// out to be the wrong shape (e.g. after `.else_()`).
pub fn expect_type(expr: &AnyExpr, expected: ResultType) -> Result<(), Error> {
	let actual = expr.result_type();
	if actual == expected {
		Ok(())
	} else {
		Err(ErrorKind::TypeError.with_context(format!("expected {expected}, found {actual}")))
	}
}
