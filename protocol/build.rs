extern crate cbindgen;

use std::env;
use std::path::Path;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let crate_dir = Path::new(&crate_dir);

    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let config = cbindgen::Config::from_file(crate_dir.join("cbindgen.toml"))
        .expect("Couldn't parse cbindgen.toml");

    // Parsing the source directly keeps cbindgen from running `cargo metadata`
    // from inside the build.
    cbindgen::Builder::new()
        .with_src(crate_dir.join("src/lib.rs"))
        .with_config(config)
        .generate()
        .expect("Couldn't generate cdc-spi-protocol.h")
        .write_to_file(crate_dir.join("cdc-spi-protocol.h"));
}
