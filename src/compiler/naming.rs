//! Deterministic names and labels of managed objects

use std::collections::BTreeMap;

/// Longest name a Service accepts (DNS-1035 label)
pub const MAX_NAME_LEN: usize = 63;

/// Product prefix of the `app` label
pub const PRODUCT: &str = "inference";

/// Which kind of entity owns a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Engine,
    Model,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Engine => write!(f, "engine"),
            Scope::Model => write!(f, "model"),
        }
    }
}

/// Lowercase, map anything outside `[a-z0-9-]` to `-`, collapse and trim dashes
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Name of the workload and endpoint serving `name` on `engine_type`
pub fn resource_name(engine_type: &str, name: &str) -> String {
    let mut full = normalize(&format!("{}-{}", engine_type, name));
    full.truncate(MAX_NAME_LEN);
    while full.ends_with('-') {
        full.pop();
    }
    full
}

/// `app`/`instance` labels shared by workload, pods and endpoint selector
pub fn labels(scope: Scope, instance: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), format!("{}-{}", PRODUCT, scope)),
        ("instance".to_string(), instance.to_string()),
    ])
}
