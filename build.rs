use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    // Copy memory.x into OUT_DIR so the linker can find it
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Link scripts only apply to the firmware image, never to host test builds
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "none" {
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        if env::var("CARGO_FEATURE_LOG_DEFMT").is_ok() {
            println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
        }
    }
}
