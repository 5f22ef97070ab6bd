// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=EXAM_SCANNER_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("EXAM_SCANNER_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(describe_head)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `1.2.0` on a release tag, `1.2.0+5.abcdef1` past it, the bare short hash
/// without tags, or `None` outside a git checkout.
fn describe_head() -> Option<String> {
    let described = git(&["describe", "--tags", "--long", "--match", "v*"]);
    let Some(described) = described else {
        return git(&["rev-parse", "--short", "HEAD"]);
    };

    // v<version>-<commits>-g<hash>
    let mut parts = described.rsplitn(3, '-');
    let hash = parts.next()?.trim_start_matches('g');
    let commits = parts.next()?;
    let tag = parts.next()?;
    let tag = tag.strip_prefix('v').unwrap_or(tag);

    if commits == "0" {
        Some(tag.to_string())
    } else {
        Some(format!("{}+{}.{}", tag, commits, hash))
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
