fn main() {
    use vergen::{BuildBuilder, CargoBuilder, Emitter};

    println!("cargo:rerun-if-changed=build.rs");

    let mut emitter = Emitter::default();

    // Feeds `--version` output; a failed probe just leaves the field unset.
    if let Ok(build) = BuildBuilder::default().build_timestamp(true).build() {
        let _ = emitter.add_instructions(&build);
    }
    if let Ok(cargo) = CargoBuilder::default().target_triple(true).build() {
        let _ = emitter.add_instructions(&cargo);
    }

    if let Err(e) = emitter.emit() {
        eprintln!("vergen emit skipped: {e}");
    }
}
