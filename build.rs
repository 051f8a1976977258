use std::process::Command;

fn main() {
    // RICE_VERSION from the environment wins (release builds), otherwise
    // ask git for a description of the checkout.
    if let Ok(version) = std::env::var("RICE_VERSION") {
        println!("cargo:rustc-env=RICE_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=RICE_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=RICE_VERSION");
}
