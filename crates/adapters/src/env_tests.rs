// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial(env)]
fn shell_defaults_to_sh() {
    std::env::remove_var("VIGIL_SHELL");
    assert_eq!(shell(), "sh");
}

#[test]
#[serial(env)]
fn shell_override_and_blank_fallback() {
    std::env::set_var("VIGIL_SHELL", "/bin/bash");
    assert_eq!(shell(), "/bin/bash");

    std::env::set_var("VIGIL_SHELL", "  ");
    assert_eq!(shell(), "sh");

    std::env::remove_var("VIGIL_SHELL");
}

#[test]
#[serial(env)]
fn port_probe_timeout_parses_millis() {
    std::env::set_var("VIGIL_PORT_PROBE_MS", "1200");
    assert_eq!(port_probe_timeout(), Duration::from_millis(1200));

    std::env::set_var("VIGIL_PORT_PROBE_MS", "not-a-number");
    assert_eq!(port_probe_timeout(), Duration::from_millis(500));

    std::env::remove_var("VIGIL_PORT_PROBE_MS");
}
