use std::path::PathBuf;
use std::{env, fs};

fn main() {
	let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("cargo should set CARGO_MANIFEST_DIR"));
	let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo should set OUT_DIR"));

	let bindings = cbindgen::generate(&crate_dir).expect("Unable to generate bindings");

	let out_header = out_dir.join("gch.h");
	bindings.write_to_file(&out_header);

	// Also emit to workspace target/generated for extension builds.
	if let Some(workspace_root) = crate_dir.parent().and_then(|p| p.parent()) {
		let gen_dir = workspace_root.join("target/generated");
		let copied = fs::create_dir_all(&gen_dir).and_then(|()| fs::copy(&out_header, gen_dir.join("gch.h")));
		if let Err(error) = copied {
			println!("cargo:warning=could not copy gch.h to {}: {error}", gen_dir.display());
		}
	}

	println!("cargo:rerun-if-changed=src/lib.rs");
	println!("cargo:rerun-if-changed=src/entry.rs");
	println!("cargo:rerun-if-changed=cbindgen.toml");
}
