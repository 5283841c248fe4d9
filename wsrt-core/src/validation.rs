//! Naming and syntax rules shared by validators and the start-order resolver.
//!
//! Every rule is anchored; partial matches never pass.

use once_cell::sync::Lazy;
use regex::Regex;

/// Unanchored machine name expression, reused inside composite patterns.
pub const MACHINE_NAME_REGEXP: &str = "[a-zA-Z0-9]+([a-zA-Z0-9_/-]*[a-zA-Z0-9])?";

static MACHINE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{MACHINE_NAME_REGEXP}$")).expect("valid machine name regex"));

static SERVER_PORT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-9]+[0-9]*(/(tcp|udp))?$").expect("valid port regex"));

static SERVER_PROTOCOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9\-+.]*$").expect("valid protocol regex"));

// service1 | service1:alias1
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "^(?P<container>{MACHINE_NAME_REGEXP})(:{MACHINE_NAME_REGEXP})?$"
    ))
    .expect("valid link regex")
});

// service1 | service1:ro | service1:rw
static VOLUMES_FROM_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^(?P<container>{MACHINE_NAME_REGEXP})(:(ro|rw))?$"))
        .expect("valid volumes_from regex")
});

pub fn is_valid_machine_name(name: &str) -> bool {
    MACHINE_NAME_PATTERN.is_match(name)
}

/// `8080`, `8080/tcp`, `53/udp`.
pub fn is_valid_server_port(port: &str) -> bool {
    SERVER_PORT_PATTERN.is_match(port)
}

pub fn is_valid_server_protocol(protocol: &str) -> bool {
    SERVER_PROTOCOL_PATTERN.is_match(protocol)
}

/// Exposed container ports follow the same syntax as server ports.
pub fn is_valid_expose(expose: &str) -> bool {
    SERVER_PORT_PATTERN.is_match(expose)
}

/// Returns the target service of a `links` entry, or `None` when malformed.
pub fn link_target(link: &str) -> Option<&str> {
    LINK_PATTERN
        .captures(link)
        .and_then(|caps| caps.name("container"))
        .map(|m| m.as_str())
}

/// Returns the target service of a `volumes_from` entry, or `None` when malformed.
pub fn volumes_from_target(volumes_from: &str) -> Option<&str> {
    VOLUMES_FROM_PATTERN
        .captures(volumes_from)
        .and_then(|caps| caps.name("container"))
        .map(|m| m.as_str())
}
