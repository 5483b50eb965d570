use std::env;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-env-changed=STEAM_SDK_LOCATION");
    if env::var_os("CARGO_FEATURE_STEAM_SDK").is_none() {
        return;
    }

    let sdk_loc = env::var("STEAM_SDK_LOCATION")
        .expect("STEAM_SDK_LOCATION must be set when building with the steam-sdk feature");
    let sdk_loc = Path::new(&sdk_loc);

    let triple = env::var("TARGET").expect("TARGET is set by cargo");
    let mut lib = "steam_api";
    let path = if triple.contains("windows") {
        if triple.contains("i686") {
            sdk_loc.join("redistributable_bin/")
        } else {
            lib = "steam_api64";
            sdk_loc.join("redistributable_bin/win64")
        }
    } else if triple.contains("linux") {
        if triple.contains("i686") {
            sdk_loc.join("redistributable_bin/linux32")
        } else {
            sdk_loc.join("redistributable_bin/linux64")
        }
    } else if triple.contains("darwin") {
        sdk_loc.join("redistributable_bin/osx")
    } else {
        panic!("Unsupported OS: {triple}");
    };
    println!("cargo:rustc-link-search={}", path.display());
    println!("cargo:rustc-link-lib=dylib={lib}");
}
