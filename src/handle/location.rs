//! Address resolution for handles

/// Schemes (and the protocol-relative prefix) that never get a base address
const ABSOLUTE_PREFIXES: [&str; 5] = ["blob:", "data:", "http://", "https://", "//"];

/// Resolve a handle's location from its configuration.
///
/// An explicit `url` is prefixed with `path`; otherwise the location is
/// synthesized as `path + key + "." + extension`.
pub fn resolve_location(
    key: &str,
    url: Option<&str>,
    path: Option<&str>,
    extension: Option<&str>,
) -> String {
    let path = path.unwrap_or("");

    match url {
        Some(url) => format!("{}{}", path, url),
        None => format!("{}{}.{}", path, key, extension.unwrap_or("")),
    }
}

pub fn is_absolute(location: &str) -> bool {
    ABSOLUTE_PREFIXES
        .iter()
        .any(|prefix| location.starts_with(prefix))
}

/// Final fetch address: absolute locations pass through, relative ones are
/// joined onto the orchestrator's base address.
pub fn resolve_transfer_url(location: &str, base_address: Option<&str>) -> String {
    match base_address {
        Some(base) if !is_absolute(location) => format!("{}{}", base, location),
        _ => location.to_string(),
    }
}
