/// Interpreter limits.
#[derive(Debug, Clone)]
pub struct Config {
    /// Nested script calls allowed before a run fails with a `TypeError`.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 128,
        }
    }
}
