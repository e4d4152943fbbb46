//! Host-based admission control
//!
//! Each listener decides per received unit whether the sending host is
//! allowed. The policy lives behind an `ArcSwap` so configuration edits
//! that don't touch port or transport apply to a running listener
//! without a restart.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

/// Which hosts a source accepts messages from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdmissionPolicy {
    /// Hosts admitted by exact string match of the peer address
    allowed_hosts: HashSet<String>,
    /// Accept any host regardless of the allow list
    auto_register: bool,
}

impl AdmissionPolicy {
    /// Build a policy from a configured host list
    pub fn new(allowed_hosts: impl IntoIterator<Item = String>, auto_register: bool) -> Self {
        Self {
            allowed_hosts: allowed_hosts.into_iter().collect(),
            auto_register,
        }
    }

    /// Policy that accepts everything
    pub fn open() -> Self {
        Self::default()
    }

    /// Whether a message from `host` should be accepted
    ///
    /// Auto-registration admits anyone; an empty allow list means
    /// "accept any host"; otherwise the peer address must be an exact
    /// member of the list.
    pub fn permits(&self, host: IpAddr) -> bool {
        if self.auto_register || self.allowed_hosts.is_empty() {
            return true;
        }
        self.allowed_hosts.contains(host.to_string().as_str())
    }
}

/// Per-listener state that can change without a socket rebind
#[derive(Debug, Clone)]
pub struct ListenerRuntime {
    /// Tag attached to every event this listener forwards
    pub slug: Arc<str>,
    /// Current admission policy
    pub admission: AdmissionPolicy,
}

impl ListenerRuntime {
    /// Create runtime state for a listener
    pub fn new(slug: impl AsRef<str>, admission: AdmissionPolicy) -> Self {
        Self {
            slug: Arc::from(slug.as_ref()),
            admission,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_allow_list_accepts_any_host() {
        let policy = AdmissionPolicy::new([], false);
        assert!(policy.permits(ip("127.0.0.1")));
        assert!(policy.permits(ip("10.0.0.1")));
        assert!(policy.permits(ip("::1")));
    }

    #[test]
    fn test_allow_list_exact_match() {
        let policy = AdmissionPolicy::new(["10.0.0.1".to_string()], false);
        assert!(policy.permits(ip("10.0.0.1")));
        assert!(!policy.permits(ip("127.0.0.1")));
        assert!(!policy.permits(ip("10.0.0.2")));
    }

    #[test]
    fn test_auto_register_overrides_allow_list() {
        let policy = AdmissionPolicy::new(["10.0.0.1".to_string()], true);
        assert!(policy.permits(ip("127.0.0.1")));
        assert!(policy.permits(ip("192.168.1.50")));
    }

    #[test]
    fn test_ipv6_match() {
        let policy = AdmissionPolicy::new(["::1".to_string()], false);
        assert!(policy.permits(ip("::1")));
        assert!(!policy.permits(ip("127.0.0.1")));
    }

    #[test]
    fn test_runtime_slug() {
        let runtime = ListenerRuntime::new("edge-firewall", AdmissionPolicy::open());
        assert_eq!(&*runtime.slug, "edge-firewall");
    }
}
