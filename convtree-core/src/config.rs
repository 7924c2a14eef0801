pub const DEFAULT_TASK_WINDOW_MS: i64 = 2000;
pub const DEFAULT_ORPHAN_RECOVERY_RATIO: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlattenOptions {
    pub task_window_ms: i64,
    pub orphan_recovery_ratio: f64,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            task_window_ms: DEFAULT_TASK_WINDOW_MS,
            orphan_recovery_ratio: DEFAULT_ORPHAN_RECOVERY_RATIO,
        }
    }
}
