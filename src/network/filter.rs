//! Interface eligibility filtering

/// Name prefixes of loopback and virtual interfaces that never take part in
/// classification
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "veth", "lo", "docker", "podman", "br-", "cni", "tunl", "tun", "tap",
];

/// Decides which interfaces are eligible by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceFilter {
    excluded_prefixes: Vec<String>,
}

impl InterfaceFilter {
    pub fn new<I, S>(excluded_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_prefixes: excluded_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// False when `name` starts with any excluded prefix
    pub fn is_eligible(&self, name: &str) -> bool {
        !self
            .excluded_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

impl Default for InterfaceFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().copied())
    }
}
