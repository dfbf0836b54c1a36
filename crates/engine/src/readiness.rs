// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Readiness signatures and port resolution for managed processes

use regex::Regex;
use std::sync::LazyLock;
use vigil_core::ManagedResource;

/// Output patterns that mean a dev server is able to serve requests.
///
/// Checked in order, case-insensitively; the first hit wins.
// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static READY_SIGNATURES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("ready", r"ready"),
        ("listening", r"listening on"),
        ("server_running", r"server running"),
        ("started_server", r"started server"),
        ("local_url", r"local:\s*https?"),
        ("localhost_port", r"localhost:\d+"),
        ("loopback_port", r"127\.0\.0\.1:\d+"),
        ("compiled", r"compiled successfully"),
        ("webpack", r"webpack compiled"),
        ("vite", r"vite.*ready"),
        ("next", r"next.*ready"),
    ]
    .into_iter()
    .map(|(name, pattern)| {
        let re = Regex::new(&format!("(?i){pattern}")).expect("constant regex pattern is valid");
        (name, re)
    })
    .collect()
});

/// Port declarations in a command line: `--port N`, `PORT=N`, `-p N`.
#[allow(clippy::expect_used)]
static COMMAND_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--port[=\s]+(\d+)|(?:PORT|port)=(\d+)|-p[=\s]+(\d+)")
        .expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static URL_PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)").expect("constant regex pattern is valid"));

/// A loopback `host:port` printed by the process itself.
#[allow(clippy::expect_used)]
static ANNOUNCED_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1?\]):(\d+)")
        .expect("constant regex pattern is valid")
});

/// Name of the first readiness signature matching `chunk`.
pub fn ready_signature(chunk: &str) -> Option<&'static str> {
    READY_SIGNATURES
        .iter()
        .find(|(_, re)| re.is_match(chunk))
        .map(|(name, _)| *name)
}

pub fn is_ready(chunk: &str) -> bool {
    ready_signature(chunk).is_some()
}

/// First port declared in a command line; the leftmost declaration wins.
pub fn port_from_command(command: &str) -> Option<u16> {
    let caps = COMMAND_PORT.captures(command)?;
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .and_then(|m| m.as_str().parse().ok())
}

/// Port of the resource: explicit probe URL first, then the command line.
pub fn resolve_port(resource: &ManagedResource) -> Option<u16> {
    let from_url = resource
        .probe_url
        .as_deref()
        .and_then(|url| URL_PORT.captures_iter(url).last())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());
    from_url.or_else(|| resource.command().and_then(port_from_command))
}

/// Loopback port announced in process output, e.g. `Local: http://localhost:5173/`.
pub fn announced_port(chunk: &str) -> Option<u16> {
    ANNOUNCED_PORT
        .captures(chunk)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// URL the health reconciler probes for a dev server.
pub fn probe_url(resource: &ManagedResource, observed_port: Option<u16>) -> Option<String> {
    resource
        .probe_url
        .clone()
        .or_else(|| observed_port.map(|port| format!("http://127.0.0.1:{}", port)))
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
