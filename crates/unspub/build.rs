use std::process::Command;

fn main() {
    emit("UNSPUB_BUILD_TARGET", std::env::var("TARGET").ok());
    emit("UNSPUB_BUILD_PROFILE", std::env::var("PROFILE").ok());

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    emit("RUSTC_VERSION", command_output(&rustc, &["--version"]));
    emit(
        "GIT_HASH",
        command_output("git", &["rev-parse", "--short=12", "HEAD"]),
    );

    println!("cargo:rerun-if-env-changed=TARGET");
    println!("cargo:rerun-if-env-changed=PROFILE");
    println!("cargo:rerun-if-changed=build.rs");
}

fn emit(key: &str, value: Option<String>) {
    if let Some(value) = value {
        println!("cargo:rustc-env={key}={value}");
    }
}

/// First line of a successful command's stdout. Builds from a source tarball
/// have no git, so failures are silent.
fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let line = text.lines().next()?.trim();
    (!line.is_empty()).then(|| line.to_string())
}
