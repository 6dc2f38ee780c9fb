//! Lowering: validates scope/type-unification that the builder layer defers, then produces the
//! wire-level IR plus an optional opportunistic [`Filter`].

use crate::err::Error;
use crate::err::ErrorKind;
use crate::expr::builder::AnyExpr;
use crate::expr::filter::extract;
use crate::expr::filter::Filter;
use crate::expr::node::ArithOp;
use crate::expr::node::CmpOp;
use crate::expr::node::ConvertKind;
use crate::expr::node::LiteralValue;
use crate::expr::node::LogicOp;
use crate::expr::node::Node;
use crate::expr::node::ResultType;
use std::collections::HashMap;
use std::sync::Arc;

/// The wire-level, tagged IR tree handed verbatim to the execution layer. Structurally mirrors
/// [`Node`] but is fully resolved: every `VarRef` has been substituted away is instead asserted
/// type-checked by [`lower`] (it still appears as a dedicated variant below so the server can
/// perform its own once-only evaluation of the bound value, matching the source semantics of "a
/// scoped binding evaluated once").
#[derive(Clone, Debug)]
pub enum IrExpr {
	/// A bin reference.
	BinRef { ty: ResultType, name: String },
	/// A literal value.
	Literal { value: LiteralValue, ty: ResultType },
	/// An arithmetic expression.
	Arith { op: ArithOp, left: Box<IrExpr>, right: Box<IrExpr>, ty: ResultType },
	/// A comparison.
	Cmp { op: CmpOp, left: Box<IrExpr>, right: Box<IrExpr> },
	/// An inclusive range check.
	Between { value: Box<IrExpr>, low: Box<IrExpr>, high: Box<IrExpr> },
	/// A logical combination.
	Logic { op: LogicOp, operands: Vec<IrExpr> },
	/// A type conversion.
	Convert { kind: ConvertKind, inner: Box<IrExpr>, ty: ResultType },
	/// A fully-unified if/else chain.
	If { branches: Vec<(IrExpr, IrExpr)>, else_branch: Box<IrExpr>, ty: ResultType },
	/// A let-binding block.
	LetIn { bindings: Vec<(String, IrExpr)>, body: Box<IrExpr>, ty: ResultType },
	/// A resolved variable reference.
	VarRef { name: String, ty: ResultType },
}

impl IrExpr {
	/// The result type this IR node evaluates to.
	pub fn result_type(&self) -> ResultType {
		match self {
			IrExpr::BinRef { ty, .. }
			| IrExpr::Literal { ty, .. }
			| IrExpr::Arith { ty, .. }
			| IrExpr::Convert { ty, .. }
			| IrExpr::If { ty, .. }
			| IrExpr::LetIn { ty, .. }
			| IrExpr::VarRef { ty, .. } => *ty,
			IrExpr::Cmp { .. } | IrExpr::Logic { .. } | IrExpr::Between { .. } => ResultType::Bool,
		}
	}
}

type Scope<'a> = HashMap<&'a str, ResultType>;

/// Lowers a fully-built expression to `(IrExpr, Option<Filter>)`. The filter is extracted from the
/// *original* tree's top level before the traversal produces the IR, per §4.2's extraction rule.
pub fn lower(expr: &AnyExpr) -> Result<(IrExpr, Option<Filter>), Error> {
	let root = expr.node();
	let filter = extract(root);
	let scope = Scope::new();
	let ir = lower_node(root, &scope)?;
	Ok((ir, filter))
}

fn lower_node(node: &Arc<Node>, scope: &Scope) -> Result<IrExpr, Error> {
	match node.as_ref() {
		Node::BinRef { ty, name } => Ok(IrExpr::BinRef { ty: *ty, name: name.clone() }),
		Node::Literal { value, ty } => Ok(IrExpr::Literal { value: value.clone(), ty: *ty }),
		Node::Arith { op, left, right, ty } => {
			let left = lower_node(left, scope)?;
			let right = lower_node(right, scope)?;
			check_same(left.result_type(), right.result_type())?;
			Ok(IrExpr::Arith { op: *op, left: Box::new(left), right: Box::new(right), ty: *ty })
		}
		Node::Cmp { op, left, right } => {
			let left = lower_node(left, scope)?;
			let right = lower_node(right, scope)?;
			check_same(left.result_type(), right.result_type())?;
			Ok(IrExpr::Cmp { op: *op, left: Box::new(left), right: Box::new(right) })
		}
		Node::Between { value, low, high } => {
			let value = lower_node(value, scope)?;
			let low = lower_node(low, scope)?;
			let high = lower_node(high, scope)?;
			check_same(value.result_type(), low.result_type())?;
			check_same(value.result_type(), high.result_type())?;
			Ok(IrExpr::Between { value: Box::new(value), low: Box::new(low), high: Box::new(high) })
		}
		Node::Logic { op, operands } => {
			let mut lowered = Vec::with_capacity(operands.len());
			for operand in operands {
				let ir = lower_node(operand, scope)?;
				check_same(ir.result_type(), ResultType::Bool)?;
				lowered.push(ir);
			}
			Ok(IrExpr::Logic { op: *op, operands: lowered })
		}
		Node::Convert { kind, inner, ty } => {
			let inner = lower_node(inner, scope)?;
			Ok(IrExpr::Convert { kind: *kind, inner: Box::new(inner), ty: *ty })
		}
		Node::If { branches, else_branch } => {
			let else_branch = else_branch
				.as_ref()
				.ok_or_else(|| ErrorKind::IllFormedConditional.with_message("if-chain has no else branch"))?;
			let mut lowered_branches = Vec::with_capacity(branches.len());
			for (cond, value) in branches {
				let cond = lower_node(cond, scope)?;
				check_same(cond.result_type(), ResultType::Bool)?;
				let value = lower_node(value, scope)?;
				lowered_branches.push((cond, value));
			}
			let else_ir = lower_node(else_branch, scope)?;
			let unified = else_ir.result_type();
			for (_, value) in &lowered_branches {
				check_same(value.result_type(), unified)?;
			}
			Ok(IrExpr::If { branches: lowered_branches, else_branch: Box::new(else_ir), ty: unified })
		}
		Node::LetIn { bindings, body } => {
			let mut inner_scope: Scope = (*scope).clone();
			let mut lowered_bindings = Vec::with_capacity(bindings.len());
			for (name, value) in bindings {
				let value_ir = lower_node(value, &inner_scope)?;
				inner_scope.insert(name.as_str(), value_ir.result_type());
				lowered_bindings.push((name.clone(), value_ir));
			}
			let body_ir = lower_node(body, &inner_scope)?;
			let ty = body_ir.result_type();
			Ok(IrExpr::LetIn { bindings: lowered_bindings, body: Box::new(body_ir), ty })
		}
		Node::VarRef { name, ty } => match scope.get(name.as_str()) {
			None => Err(ErrorKind::ScopeError.with_context(format!("undefined variable `{name}`"))),
			Some(bound_ty) if *bound_ty != *ty => Err(ErrorKind::TypeError.with_context(format!(
				"variable `{name}` was bound as {bound_ty} but referenced as {ty}"
			))),
			Some(bound_ty) => Ok(IrExpr::VarRef { name: name.clone(), ty: *bound_ty }),
		},
	}
}

fn check_same(a: ResultType, b: ResultType) -> Result<(), Error> {
	if a == b {
		Ok(())
	} else {
		Err(ErrorKind::TypeError.with_context(format!("operand type mismatch: {a} vs {b}")))
	}
}
