//! # 读写错误台账
//!
//! 记录当前处于失败状态的变量名：
//! - 某个变量的读写失败时登记（已存在则刷新时间）
//! - 同一变量的读写成功后移除
//!
//! 连接失败不属于任何变量，不会进入台账。

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// 错误台账
///
/// **不变量**: 同一变量名最多只有一条记录
#[derive(Debug, Default, Clone)]
pub struct ErrorLedger {
    entries: HashMap<String, DateTime<Utc>>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次失败
    ///
    /// 返回true表示该变量是新进入台账的
    pub fn record_failure(&mut self, name: &str) -> bool {
        self.entries.insert(name.to_string(), Utc::now()).is_none()
    }

    /// 登记一次成功
    ///
    /// 返回true表示该变量此前在台账中
    pub fn record_success(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// 当前失败变量名的快照（按名称排序）
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    /// 台账中最近一次失败的时间
    pub fn latest_failure(&self) -> Option<DateTime<Utc>> {
        self.entries.values().max().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_then_success_clears_entry() {
        let mut ledger = ErrorLedger::new();
        assert!(ledger.record_failure("MAIN.bLamp"));
        assert_eq!(ledger.names(), vec!["MAIN.bLamp".to_string()]);
        assert!(ledger.record_success("MAIN.bLamp"));
        assert!(ledger.names().is_empty());
        assert_eq!(ledger.latest_failure(), None);
        // 不在台账中的成功不产生变化
        assert!(!ledger.record_success("MAIN.bLamp"));
    }

    #[test]
    fn test_repeated_failure_keeps_single_entry() {
        let mut ledger = ErrorLedger::new();
        assert!(ledger.record_failure("GVL.x"));
        let first = ledger.latest_failure().unwrap();
        assert!(!ledger.record_failure("GVL.x"));
        assert_eq!(ledger.names(), vec!["GVL.x".to_string()]);
        assert!(ledger.latest_failure().unwrap() >= first);
    }

    #[test]
    fn test_names_sorted_snapshot() {
        let mut ledger = ErrorLedger::new();
        ledger.record_failure("b");
        ledger.record_failure("a");
        let snapshot = ledger.names();
        ledger.record_success("a");
        assert_eq!(snapshot, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(ledger.names(), vec!["b".to_string()]);
    }
}
