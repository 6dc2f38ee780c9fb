use fluentkv::expr::{int_bin, lower, str_bin};

fn main() {
	tracing_subscriber::fmt::init();

	let predicate = int_bin("age").gte(21).and(str_bin("name").eq("Tim"));
	let (ir, filter) = lower(&predicate.erase()).expect("well-typed expression");
	println!("lowered IR: {ir:?}");
	println!("extracted filter: {filter:?}");

	// A single comparison on an indexed bin also yields an index filter alongside the IR.
	let point = int_bin("age").gte(21);
	let (_, filter) = lower(&point.erase()).expect("well-typed expression");
	assert!(filter.is_some());
}
