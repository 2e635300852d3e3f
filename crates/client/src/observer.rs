//! Usage observation. Observers see every successful exchange but can
//! never influence the session.

use std::collections::BTreeMap;
use std::sync::Mutex;

use henkan_protocol::{CommandType, Input, Output, SpecialKey};

pub trait UsageObserver: Send + Sync {
    fn observe(&self, input: &Input, output: &Output);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub requests: BTreeMap<CommandType, u64>,
    pub consumed_keys: u64,
    pub unconsumed_keys: u64,
    pub special_keys: BTreeMap<SpecialKey, u64>,
    pub sessions_created: u64,
    pub total_elapsed_us: u64,
}

impl UsageSnapshot {
    pub fn total_requests(&self) -> u64 {
        self.requests.values().sum()
    }

    pub fn count(&self, kind: CommandType) -> u64 {
        self.requests.get(&kind).copied().unwrap_or(0)
    }
}

/// In-memory counters for requests sent through a `SessionClient`.
#[derive(Debug, Default)]
pub struct UsageStats {
    inner: Mutex<UsageSnapshot>,
}

impl UsageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = UsageSnapshot::default();
        }
    }
}

impl UsageObserver for UsageStats {
    fn observe(&self, input: &Input, output: &Output) {
        let Ok(mut stats) = self.inner.lock() else {
            return;
        };

        *stats.requests.entry(input.kind).or_insert(0) += 1;
        stats.total_elapsed_us += output.elapsed_time.unwrap_or(0);

        match input.kind {
            CommandType::SendKey => {
                if output.consumed {
                    stats.consumed_keys += 1;
                } else {
                    stats.unconsumed_keys += 1;
                }
                if let Some(special) = input.key.as_ref().and_then(|k| k.special_key) {
                    *stats.special_keys.entry(special).or_insert(0) += 1;
                }
            }
            CommandType::CreateSession if output.id.is_some() => {
                stats.sessions_created += 1;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use henkan_protocol::{KeyEvent, SessionId};

    fn key_output(consumed: bool) -> Output {
        Output {
            consumed,
            elapsed_time: Some(100),
            ..Output::with_id(SessionId(1))
        }
    }

    #[test]
    fn test_counts_keys_and_requests() {
        let stats = UsageStats::new();
        let enter = Input::new(CommandType::SendKey).with_key(KeyEvent::special(SpecialKey::Enter));
        let a = Input::new(CommandType::SendKey).with_key(KeyEvent::character('a'));

        stats.observe(&enter, &key_output(true));
        stats.observe(&a, &key_output(false));
        stats.observe(&Input::new(CommandType::NoOperation), &Output::default());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.count(CommandType::SendKey), 2);
        assert_eq!(snapshot.count(CommandType::NoOperation), 1);
        assert_eq!(snapshot.total_requests(), 3);
        assert_eq!(snapshot.consumed_keys, 1);
        assert_eq!(snapshot.unconsumed_keys, 1);
        assert_eq!(snapshot.special_keys.get(&SpecialKey::Enter), Some(&1));
        assert_eq!(snapshot.total_elapsed_us, 200);
    }

    #[test]
    fn test_counts_created_sessions_only_with_id() {
        let stats = UsageStats::new();
        let create = Input::new(CommandType::CreateSession);
        stats.observe(&create, &Output::with_id(SessionId(9)));
        stats.observe(&create, &Output::default());

        assert_eq!(stats.snapshot().sessions_created, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), UsageSnapshot::default());
    }
}
