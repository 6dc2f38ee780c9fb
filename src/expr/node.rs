//! The tagged, immutable expression tree produced by the builder layer.

use std::sync::Arc;

/// The five result types a node's value may carry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ResultType {
	/// 64-bit signed integer.
	Int,
	/// 64-bit IEEE-754 float.
	Float,
	/// UTF-8 string.
	Str,
	/// Boolean.
	Bool,
	/// Opaque byte blob.
	Blob,
}

impl std::fmt::Display for ResultType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			ResultType::Int => "Int",
			ResultType::Float => "Float",
			ResultType::Str => "Str",
			ResultType::Bool => "Bool",
			ResultType::Blob => "Blob",
		};
		write!(f, "{s}")
	}
}

/// A literal value, always paired with its [`ResultType`].
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
	/// Already widened to 64 bits; builders widen 32-bit literals on construction.
	Int(i64),
	/// Already widened to 64 bits.
	Float(f64),
	/// UTF-8 string.
	Str(String),
	/// Boolean.
	Bool(bool),
	/// Opaque bytes.
	Blob(Vec<u8>),
}

/// Arithmetic operators, valid on `Int` and `Float` operands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArithOp {
	/// Addition.
	Add,
	/// Subtraction.
	Sub,
	/// Multiplication.
	Mul,
	/// Division. Division by a literal zero lowers normally; the server defines runtime
	/// semantics.
	Div,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
	/// `=`
	Eq,
	/// `<>`
	Ne,
	/// `<`
	Lt,
	/// `<=`
	Le,
	/// `>`
	Gt,
	/// `>=`
	Ge,
}

/// Logical operators over `Bool` operands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicOp {
	/// Short-circuit AND.
	And,
	/// Short-circuit OR.
	Or,
	/// Unary negation.
	Not,
}

/// Explicit, lossy type conversions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConvertKind {
	/// `Int -> Float`.
	ToFloat,
	/// `Float -> Int`, truncating toward zero.
	ToInt,
}

/// One node of the expression tree. Immutable once constructed; sharing via `Arc` is permitted
/// and expected (`let`-bound values are evaluated once and referenced from multiple `var` sites).
#[derive(Clone, Debug)]
pub enum Node {
	/// A reference to a named bin of a given type on the record under evaluation.
	BinRef {
		/// The bin's declared type.
		ty: ResultType,
		/// The bin's name.
		name: String,
	},
	/// A literal value.
	Literal {
		/// The literal's value.
		value: LiteralValue,
		/// The literal's type (redundant with `value`'s variant, kept for uniform matching).
		ty: ResultType,
	},
	/// A binary arithmetic expression over `Int` or `Float` operands.
	Arith {
		/// The operator.
		op: ArithOp,
		/// The left-hand, already-evaluated operand (left-to-right chaining means this is
		/// whatever came before `.add()`/`.sub()`/etc. was called).
		left: Arc<Node>,
		/// The right-hand operand.
		right: Arc<Node>,
		/// The result type, equal to both operands' type.
		ty: ResultType,
	},
	/// A binary comparison, always of type `Bool`.
	Cmp {
		/// The operator.
		op: CmpOp,
		/// Left operand.
		left: Arc<Node>,
		/// Right operand.
		right: Arc<Node>,
	},
	/// `low <= value <= high`, always of type `Bool`. Kept as a dedicated three-operand node
	/// rather than a `CmpOp` variant, since a comparison operator elsewhere always pairs with
	/// exactly one left/right operand.
	Between {
		/// The value being range-checked.
		value: Arc<Node>,
		/// The inclusive lower bound.
		low: Arc<Node>,
		/// The inclusive upper bound.
		high: Arc<Node>,
	},
	/// A logical combination of `Bool` operands. `Not` carries exactly one operand.
	Logic {
		/// The operator.
		op: LogicOp,
		/// The operands.
		operands: Vec<Arc<Node>>,
	},
	/// An explicit type conversion.
	Convert {
		/// Which conversion.
		kind: ConvertKind,
		/// The value being converted.
		inner: Arc<Node>,
		/// The result type.
		ty: ResultType,
	},
	/// An `if`/`elif`*/`else` chain. Every branch pairs a `Bool` condition with a value
	/// expression; `else_branch` is always present once the chain is fully built (the builder's
	/// type-state makes it otherwise unreachable) but is still checked defensively at lowering
	/// time for anyone constructing a `Node` directly.
	If {
		/// `(condition, value)` pairs in `if`, `elif`, `elif`, ... order.
		branches: Vec<(Arc<Node>, Arc<Node>)>,
		/// The final, unconditional branch.
		else_branch: Option<Arc<Node>>,
	},
	/// A scoped block of local-variable bindings evaluated once and visible to `body` and to any
	/// later binding in the same block.
	LetIn {
		/// `(name, value)` pairs, in declaration order. Later bindings may reference earlier ones.
		bindings: Vec<(String, Arc<Node>)>,
		/// The expression evaluated in the scope of `bindings`.
		body: Arc<Node>,
	},
	/// A reference to a name bound by an enclosing [`Node::LetIn`]. Resolved and type-checked at
	/// lowering time.
	VarRef {
		/// The referenced name.
		name: String,
		/// The result type asserted by the builder that created this reference; checked for
		/// agreement with the binding's actual type at lowering time.
		ty: ResultType,
	},
}

impl Node {
	/// The statically-known result type of this node. For `If`, this is the type asserted by the
	/// first branch; full unification across all branches happens during [`crate::expr::lower`].
	pub fn result_type(&self) -> ResultType {
		match self {
			Node::BinRef { ty, .. }
			| Node::Literal { ty, .. }
			| Node::Arith { ty, .. }
			| Node::Convert { ty, .. }
			| Node::VarRef { ty, .. } => *ty,
			Node::Cmp { .. } | Node::Logic { .. } | Node::Between { .. } => ResultType::Bool,
			Node::If { branches, else_branch } => branches
				.first()
				.map(|(_, v)| v.result_type())
				.or_else(|| else_branch.as_ref().map(|e| e.result_type()))
				.unwrap_or(ResultType::Bool),
			Node::LetIn { body, .. } => body.result_type(),
		}
	}
}
