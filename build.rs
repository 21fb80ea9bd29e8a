//! Build script for shmif-bridge
//!
//! Stamps the commit and build date into the probe's startup diagnostics.

use std::process::Command;

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn main() {
    let commit = command_output("git", &["rev-parse", "--short", "HEAD"])
        .unwrap_or_else(|| "unknown".to_string());
    let date = command_output("date", &["+%Y-%m-%d"]).unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=SHMIF_BRIDGE_COMMIT={}", commit);
    println!("cargo:rustc-env=SHMIF_BRIDGE_BUILD_DATE={}", date);
    println!("cargo:rerun-if-changed=.git/HEAD");
}
