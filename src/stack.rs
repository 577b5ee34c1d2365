/// Stack that must be left before a recursive step runs on the current
/// segment.
const RED_ZONE: usize = 128 * 1024;

/// Size of each segment allocated once the red zone is reached.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Runs one step of a recursive parse or evaluation, moving it to a freshly
/// allocated segment when the current stack is nearly used up. Nesting is
/// then bounded by the parser's nesting limit and `Config::max_call_depth`,
/// not by the size of the host thread's stack.
pub(crate) fn guard<R>(step: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, step)
}

#[cfg(test)]
mod test {
    use super::*;

    fn depth(n: usize) -> usize {
        guard(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_guard_grows_small_stacks() {
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024)
            .spawn(|| depth(100_000))
            .unwrap();
        assert_eq!(handle.join().unwrap(), 100_000);
    }
}
