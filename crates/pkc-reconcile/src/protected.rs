/// System-critical packages that must never be removed.
///
/// Patterns without `*` match exactly.
pub const BASELINE_PATTERNS: &[&str] = &[
    // boot chain and kernel
    "linux-*",
    "grub-*",
    "initramfs-tools*",
    "kernelstub*",
    "plymouth*",
    // init, bus, device management
    "systemd*",
    "dbus*",
    "udev*",
    "init",
    // distribution and desktop
    "pop-*",
    "cosmic-*",
    "system76-*",
    "gdm*",
    // package management
    "apt*",
    "dpkg*",
    "flatpak",
    "snapd*",
    // core libraries
    "libc6*",
    "libsystemd*",
    "libnss*",
    "libpam*",
    // networking
    "network-manager*",
    "iproute2",
    "netbase",
    "hostname",
    // userland essentials
    "bash",
    "coreutils",
    "util-linux",
    "sudo",
    "passwd",
    "login",
];

/// Case-sensitive `*` glob set.
///
/// The first matching pattern (in insertion order) is reported so callers can
/// say *why* a package was protected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtectedMatcher {
    patterns: Vec<String>,
}

impl ProtectedMatcher {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut m = Self::default();
        m.extend(patterns);
        m
    }

    pub fn baseline() -> Self {
        Self::new(BASELINE_PATTERNS.iter().copied())
    }

    /// Baseline (when requested) followed by `extra`.
    pub fn from_config<I, S>(use_baseline: bool, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut m = if use_baseline { Self::baseline() } else { Self::empty() };
        m.extend(extra);
        m
    }

    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for p in patterns {
            let p = p.into();
            if !p.is_empty() && !self.patterns.contains(&p) {
                self.patterns.push(p);
            }
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matching_pattern(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| glob_match(p, name))
            .map(String::as_str)
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.matching_pattern(name).is_some()
    }
}

fn glob_match(pattern: &str, name: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == name;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let (first, last) = (parts[0], parts[parts.len() - 1]);

    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    // Leftmost match for each interior literal leaves the most room for the suffix.
    for mid in &parts[1..parts.len() - 1] {
        if mid.is_empty() {
            continue;
        }
        match rest.find(mid) {
            Some(i) => rest = &rest[i + mid.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_suffix_and_exact_forms() {
        assert!(glob_match("linux-*", "linux-image-6.8"));
        assert!(!glob_match("linux-*", "linux"));
        assert!(glob_match("*-dev", "libssl-dev"));
        assert!(glob_match("lib*-dev", "libssl-dev"));
        assert!(!glob_match("lib*-dev", "libssl-doc"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("bash", "bash"));
        assert!(!glob_match("bash", "bash-completion"));
    }

    #[test]
    fn interior_literal_cannot_overlap_suffix() {
        assert!(glob_match("a*bc*c", "abcc"));
        assert!(!glob_match("a*bc*c", "abc"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let m = ProtectedMatcher::new(["tel*"]);
        assert!(m.is_protected("telnet"));
        assert!(!m.is_protected("Telnet"));
    }

    #[test]
    fn reports_first_matching_pattern() {
        let m = ProtectedMatcher::from_config(true, ["systemd-*"]);
        assert_eq!(m.matching_pattern("systemd-resolved"), Some("systemd*"));
        assert_eq!(m.matching_pattern("vim"), None);
    }

    #[test]
    fn duplicate_patterns_are_collapsed() {
        let m = ProtectedMatcher::new(["a*", "a*", "b"]);
        assert_eq!(m.patterns().len(), 2);
    }
}
