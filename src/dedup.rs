use std::collections::HashSet;
use std::sync::Mutex;

/// Names already handed to the sink. Shared by every row task.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashSet<String>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a (trimmed) name is offered.
    /// A blank name is a key like any other.
    pub fn admit(&self, name: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(name.trim().to_string())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_admit_first_only() {
        let d = Deduplicator::new();
        assert!(d.admit("Dup Game"));
        assert!(!d.admit("Dup Game"));
        assert!(!d.admit("  Dup Game "));
        assert!(d.admit("Other Game"));
        assert!(d.admit("   "));
        assert!(!d.admit(""));
        assert_eq!(d.len(), 3);
    }

    #[tokio::test]
    async fn test_admit_is_atomic_across_tasks() {
        let d = Arc::new(Deduplicator::new());
        let mut handles = vec![];
        for _ in 0..16 {
            let d = d.clone();
            handles.push(tokio::spawn(async move {
                (0..50).filter(|i| d.admit(&format!("game {}", i))).count()
            }));
        }

        let mut admitted = 0;
        for h in handles {
            admitted += h.await.unwrap();
        }
        assert_eq!(admitted, 50);
        assert_eq!(d.len(), 50);
    }
}
