use fluentkv::behavior::{self, Mode, OpKind, OpShape, Triple};

const CONFIG: &str = r#"
	[behaviors.DEFAULT]

	[behaviors.aggressive]
	parent = "DEFAULT"

	[behaviors.aggressive.reads]
	max_attempts = 4
	timeout_per_attempt = "250ms"

	[behaviors.aggressive."reads.batch.ap"]
	max_attempts = 8
"#;

fn main() {
	tracing_subscriber::fmt::init();

	let (behaviors, system) = behavior::config::load_from_str(CONFIG).expect("valid configuration");
	behavior::registry::swap(behaviors, system).expect("DEFAULT behavior present");

	let aggressive = behavior::registry::lookup("aggressive");
	let point_read = aggressive.resolve(Triple::new(OpKind::Read, OpShape::Point, Mode::Ap));
	let batch_read = aggressive.resolve(Triple::new(OpKind::Read, OpShape::Batch, Mode::Ap));

	println!("point read max_attempts: {}", point_read.max_attempts);
	println!("batch/ap read max_attempts: {}", batch_read.max_attempts);

	let policy = behavior::as_read_policy(&point_read);
	println!("read policy: {policy:?}");
}
