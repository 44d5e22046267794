//! Build script probing for the system OpenCV the `opencv` crate links against.

use std::env;
use std::process::Command;

/// pkg-config names OpenCV is published under, newest first
const OPENCV_PACKAGES: [&str; 2] = ["opencv4", "opencv"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo:rerun-if-env-changed=OPENCV_LINK_PATHS");
    println!("cargo:rerun-if-env-changed=OPENCV_INCLUDE_PATHS");

    if pkg_config(&["--version"]).is_none() {
        println!("cargo:warning=pkg-config not found. It is used to locate OpenCV.");
        println!("cargo:warning=On Ubuntu: sudo apt-get install pkg-config");
        println!("cargo:warning=On macOS: brew install pkg-config");
    }

    match OPENCV_PACKAGES.iter().find_map(|name| pkg_config(&["--modversion", name])) {
        Some(version) => println!("cargo:warning=Found OpenCV version: {version}"),
        None => {
            println!("cargo:warning=OpenCV not found via pkg-config. Capture, face detection and PnP need it.");
            println!("cargo:warning=On Ubuntu: sudo apt-get install libopencv-dev");
            println!("cargo:warning=On macOS: brew install opencv");
        }
    }

    println!("cargo:rustc-env=BUILD_TARGET={}", env::var("TARGET").unwrap_or_default());
}

/// Trimmed stdout of a successful pkg-config call
fn pkg_config(args: &[&str]) -> Option<String> {
    let output = Command::new("pkg-config").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
