//! Stamps build identity into the binary for `GET /health`
//!
//! `GIT_HASH` is the short commit, suffixed `-dirty` when the working tree
//! has uncommitted changes, or `unknown` outside a checkout.
//! `BUILD_TIMESTAMP` is RFC 3339 UTC. `BUILD_PROFILE` is cargo's profile.

use std::process::Command;

const UNKNOWN: &str = "unknown";

/// Trimmed stdout of a successful git invocation
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    Some(text.trim().to_string())
}

fn commit_id() -> String {
    let Some(hash) = git(&["rev-parse", "--short=8", "HEAD"]).filter(|h| !h.is_empty()) else {
        return UNKNOWN.to_string();
    };

    match git(&["status", "--porcelain", "--untracked-files=no"]) {
        Some(changes) if !changes.is_empty() => format!("{}-dirty", hash),
        _ => hash,
    }
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn main() {
    emit("GIT_HASH", &commit_id());
    emit(
        "BUILD_TIMESTAMP",
        &chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    );
    emit(
        "BUILD_PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| UNKNOWN.to_string()),
    );
}
