use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::error::NodeError;

/// Shared running sum of LLM tokens for one run. The agent loop charges it
/// after every round; the scheduler re-checks at each level barrier.
#[derive(Debug, Clone, Default)]
pub struct TokenMeter {
    used: Arc<AtomicI64>,
    ceiling: Option<i64>,
}

impl TokenMeter {
    pub fn new(ceiling: Option<i64>) -> Self {
        Self {
            used: Arc::new(AtomicI64::new(0)),
            ceiling,
        }
    }

    pub fn charge(&self, tokens: i64) {
        self.used.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn used(&self) -> i64 {
        self.used.load(Ordering::Relaxed)
    }

    /// Error once the running sum crosses the ceiling.
    pub fn check(&self) -> Result<(), NodeError> {
        let Some(ceiling) = self.ceiling else {
            return Ok(());
        };
        let used = self.used();
        if used > ceiling {
            return Err(NodeError::TokenCeilingExceeded { used, ceiling });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_never_fails() {
        let meter = TokenMeter::new(None);
        meter.charge(1_000_000);
        assert!(meter.check().is_ok());
    }

    #[test]
    fn test_crossing_the_ceiling() {
        let meter = TokenMeter::new(Some(50));
        meter.charge(30);
        assert!(meter.check().is_ok());
        meter.charge(30);
        match meter.check() {
            Err(NodeError::TokenCeilingExceeded { used, ceiling }) => {
                assert_eq!(used, 60);
                assert_eq!(ceiling, 50);
            }
            other => panic!("expected TokenCeilingExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_clones_share_the_sum() {
        let meter = TokenMeter::new(Some(10));
        let clone = meter.clone();
        clone.charge(20);
        assert_eq!(meter.used(), 20);
        assert!(meter.check().is_err());
    }
}
