// src/config/filter_policy.rs

/// 业务过滤策略：按来源 IP 前缀丢弃内网/测试流量。
///
/// 只做字符串前缀匹配，不做 CIDR 计算。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPolicy {
    pub excluded_ip_prefixes: Vec<String>,
}

impl FilterPolicy {
    pub fn new(excluded_ip_prefixes: Vec<String>) -> Self {
        FilterPolicy { excluded_ip_prefixes }
    }

    /// 从逗号分隔的参数构造，例如 `"10.10.,192.168."`，空项会被忽略
    pub fn from_args(excluded_ip_prefixes: &str) -> Self {
        let prefixes = excluded_ip_prefixes
            .split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(String::from)
            .collect();
        FilterPolicy::new(prefixes)
    }

    /// 空 IP 永远不命中
    pub fn is_excluded_ip(&self, ip: &str) -> bool {
        !ip.is_empty()
            && self
                .excluded_ip_prefixes
                .iter()
                .any(|prefix| ip.starts_with(prefix.as_str()))
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        FilterPolicy::from_args(super::DEFAULT_EXCLUDED_IP_PREFIXES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_internal_range() {
        let policy = FilterPolicy::default();
        assert_eq!(policy.excluded_ip_prefixes, vec!["10.10.".to_string()]);
        assert!(policy.is_excluded_ip("10.10.1.20"));
        assert!(!policy.is_excluded_ip("10.100.1.20"));
        assert!(!policy.is_excluded_ip("8.8.8.8"));
    }

    #[test]
    fn from_args_splits_and_trims() {
        let policy = FilterPolicy::from_args(" 10.10. , 192.168.,,");
        assert_eq!(policy.excluded_ip_prefixes, vec!["10.10.", "192.168."]);
        assert!(policy.is_excluded_ip("192.168.0.1"));
    }

    #[test]
    fn empty_ip_never_matches() {
        let policy = FilterPolicy::new(vec![String::new(), "10.".to_string()]);
        assert!(!policy.is_excluded_ip(""));

        let policy = FilterPolicy::from_args("");
        assert!(policy.excluded_ip_prefixes.is_empty());
        assert!(!policy.is_excluded_ip("10.10.0.1"));
    }
}
