pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// Deterministic estimate of roughly four characters per token, rounded up.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioTokenCounter {
    pub chars_per_token: u64,
}

impl Default for CharRatioTokenCounter {
    fn default() -> Self {
        Self { chars_per_token: 4 }
    }
}

impl TokenCounter for CharRatioTokenCounter {
    fn count(&self, text: &str) -> u64 {
        let chars = text.chars().count() as u64;
        chars.div_ceil(self.chars_per_token.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::{CharRatioTokenCounter, TokenCounter};

    #[test]
    fn rounds_partial_tokens_up() {
        let counter = CharRatioTokenCounter::default();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }
}
