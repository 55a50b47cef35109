use std::env;

fn main() {
    println!("cargo:rerun-if-changed=native/test_resource.c");

    // Native fixture standing in for a foreign resource in the C ABI tests.
    // Kept out of release artifacts unless asked for.
    if env::var_os("CARGO_FEATURE_TEST_FIXTURE").is_none() {
        return;
    }

    cc::Build::new()
        .file("native/test_resource.c")
        .flag_if_supported("-O2")
        .warnings(true)
        .compile("hybrid_test_resource");
}
