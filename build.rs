// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Stamps the build date and time into the abort banner.

fn main() {
    let now = chrono::Local::now();
    println!("cargo:rustc-env=CRASHLOG_BUILD_DATE={}", now.format("%b %e %Y"));
    println!("cargo:rustc-env=CRASHLOG_BUILD_TIME={}", now.format("%H:%M:%S"));
    println!("cargo:rerun-if-changed=build.rs");
}
