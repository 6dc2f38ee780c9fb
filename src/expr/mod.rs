//! The typed expression DSL, its immutable IR, and lowering to the backend filter/wire
//! representation.
//!
//! ```
//! use fluentkv::expr::{int_bin, str_bin, lower};
//!
//! let predicate = int_bin("age").gt(17).and(str_bin("name").eq("Tim"));
//! let (ir, filter) = lower(&predicate.erase()).unwrap();
//! assert!(filter.is_none()); // a conjunction is not a single top-level predicate
//! let _ = ir;
//! ```

pub mod builder;
pub mod filter;
pub mod lower;
pub mod node;

pub use builder::blob_bin;
pub use builder::bool_bin;
pub use builder::define;
pub use builder::expect_type;
pub use builder::float_bin;
pub use builder::if_;
pub use builder::int_bin;
pub use builder::str_bin;
pub use builder::var_blob;
pub use builder::var_bool;
pub use builder::var_float;
pub use builder::var_int;
pub use builder::var_str;
pub use builder::AnyExpr;
pub use builder::BlobExpr;
pub use builder::BoolExpr;
pub use builder::FloatExpr;
pub use builder::IfBuilder;
pub use builder::IntExpr;
pub use builder::LetBuilder;
pub use builder::StrExpr;
pub use filter::Filter;
pub use lower::lower;
pub use lower::IrExpr;
pub use node::ArithOp;
pub use node::CmpOp;
pub use node::ConvertKind;
pub use node::LiteralValue;
pub use node::LogicOp;
pub use node::Node;
pub use node::ResultType;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn conjunction_lowers_without_filter() {
		let predicate = int_bin("age").gt(17).and(str_bin("name").eq("Tim"));
		let (ir, filter) = lower(&predicate.erase()).unwrap();
		assert!(filter.is_none());
		match ir {
			IrExpr::Logic { op: LogicOp::And, operands } => assert_eq!(operands.len(), 2),
			other => panic!("expected Logic::And, got {other:?}"),
		}
	}

	#[test]
	fn single_comparison_extracts_range_filter() {
		let predicate = int_bin("age").gte(21);
		let (_, filter) = lower(&predicate.erase()).unwrap();
		assert!(matches!(filter, Some(Filter::Range(Some(LiteralValue::Int(21)), None))));
	}

	#[test]
	fn chained_arithmetic_is_left_to_right() {
		// a.add(3).mul(4) must lower as (a + 3) * 4, not algebraic precedence.
		let expr = int_bin("a").add(3).mul(4);
		let (ir, _) = lower(&expr.erase()).unwrap();
		match ir {
			IrExpr::Arith { op: ArithOp::Mul, left, right, .. } => {
				assert!(matches!(*right, IrExpr::Literal { value: LiteralValue::Int(4), .. }));
				assert!(matches!(*left, IrExpr::Arith { op: ArithOp::Add, .. }));
			}
			other => panic!("expected outer Mul, got {other:?}"),
		}
	}

	#[test]
	fn if_chain_requires_else_and_unifies_types() {
		let expr = if_(bool_bin("active"), int_bin("a")).elif(bool_bin("other"), int_bin("b")).else_(int_bin("c"));
		let (ir, _) = lower(&expr).unwrap();
		assert_eq!(ir.result_type(), ResultType::Int);
	}

	#[test]
	fn let_binding_resolves_var_ref() {
		let expr = define("x").as_(int_bin("age").add(1)).then(var_int("x").gt(18));
		let (ir, _) = lower(&expr).unwrap();
		assert_eq!(ir.result_type(), ResultType::Bool);
	}

	#[test]
	fn unbound_var_is_a_scope_error() {
		let expr = var_int("ghost").gt(1);
		let err = lower(&expr.erase()).unwrap_err();
		assert_eq!(err.kind(), crate::err::ErrorKind::ScopeError);
	}

	#[test]
	fn between_extracts_a_two_sided_range_filter() {
		let predicate = int_bin("age").between(18, 65);
		let (ir, filter) = lower(&predicate.erase()).unwrap();
		assert!(matches!(filter, Some(Filter::Range(Some(LiteralValue::Int(18)), Some(LiteralValue::Int(65))))));
		assert_eq!(ir.result_type(), ResultType::Bool);
	}

	#[test]
	fn to_float_then_to_int_round_trips_type() {
		let expr = int_bin("a").to_float().add(1.5_f64).to_int();
		let (ir, _) = lower(&expr.erase()).unwrap();
		assert_eq!(ir.result_type(), ResultType::Int);
	}
}
