//! Task variants and weighted task selection.
//!
//! Each actor iteration runs one task picked at random in proportion to its
//! weight. With the default weights 10:5:3:3 simple completions are issued
//! roughly 10/21 of the time.

use std::fmt;

use rand::Rng;

/// The units of work an actor can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatTask {
    /// Single prompt, random model and temperature.
    SimpleCompletion,
    /// Fixed three-message conversation.
    MultiTurnCompletion,
    /// Upload, analyze, then delete without tracking the delete.
    UploadAnalyzeDeleteUntracked,
    /// Upload, analyze, then delete inside the upload's measured scope.
    UploadAnalyzeDeleteTracked,
}

impl ChatTask {
    pub const ALL: [ChatTask; 4] = [
        ChatTask::SimpleCompletion,
        ChatTask::MultiTurnCompletion,
        ChatTask::UploadAnalyzeDeleteUntracked,
        ChatTask::UploadAnalyzeDeleteTracked,
    ];

    /// Label used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ChatTask::SimpleCompletion => "simple_completion",
            ChatTask::MultiTurnCompletion => "multi_turn_completion",
            ChatTask::UploadAnalyzeDeleteUntracked => "upload_analyze_delete_untracked",
            ChatTask::UploadAnalyzeDeleteTracked => "upload_analyze_delete_tracked",
        }
    }
}

impl fmt::Display for ChatTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relative weight of each task, in [`ChatTask::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWeights([u32; 4]);

impl TaskWeights {
    /// Builds weights; at least one must be non-zero and the sum must fit in a `u32`.
    pub fn new(weights: [u32; 4]) -> Result<Self, String> {
        if weights.iter().all(|w| *w == 0) {
            return Err("At least one task weight must be greater than zero".to_string());
        }
        weights
            .iter()
            .try_fold(0u32, |sum, w| sum.checked_add(*w))
            .ok_or_else(|| format!("Sum of task weights exceeds {}", u32::MAX))?;
        Ok(Self(weights))
    }

    /// Parses `"10,5,3,3"`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(format!(
                "Expected 4 comma-separated weights (simple, multi-turn, upload-untracked, upload-tracked), got {}",
                parts.len()
            ));
        }

        let mut weights = [0u32; 4];
        for (slot, part) in weights.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| format!("Invalid task weight: '{}'", part))?;
        }
        Self::new(weights)
    }

    pub fn weight(&self, task: ChatTask) -> u32 {
        let index = ChatTask::ALL
            .iter()
            .position(|t| *t == task)
            .unwrap_or_default();
        self.0[index]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl Default for TaskWeights {
    fn default() -> Self {
        Self([10, 5, 3, 3])
    }
}

/// Weighted random task selector.
///
/// Uses cumulative weights and a binary search; tasks with zero weight are
/// never returned.
#[derive(Debug, Clone)]
pub struct TaskSelector {
    tasks: Vec<ChatTask>,
    cumulative_weights: Vec<u32>,
    total_weight: u32,
}

impl TaskSelector {
    pub fn new(weights: TaskWeights) -> Self {
        let mut tasks = Vec::with_capacity(ChatTask::ALL.len());
        let mut cumulative = Vec::with_capacity(ChatTask::ALL.len());
        let mut sum = 0;

        for task in ChatTask::ALL {
            let weight = weights.weight(task);
            if weight == 0 {
                continue;
            }
            sum += weight;
            tasks.push(task);
            cumulative.push(sum);
        }

        Self {
            tasks,
            cumulative_weights: cumulative,
            total_weight: sum,
        }
    }

    /// Select a task using the caller's random source.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> ChatTask {
        let random = rng.gen_range(0..self.total_weight);

        let index = self
            .cumulative_weights
            .binary_search_by(|weight| {
                if *weight <= random {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            })
            .unwrap_or_else(|i| i);

        self.tasks[index]
    }

    /// Selection probability of every task with a non-zero weight.
    pub fn probabilities(&self) -> Vec<(ChatTask, f64)> {
        let mut previous = 0;
        self.tasks
            .iter()
            .zip(&self.cumulative_weights)
            .map(|(task, cumulative)| {
                let weight = cumulative - previous;
                previous = *cumulative;
                (*task, weight as f64 / self.total_weight as f64)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_overflowing_total_rejected() {
        assert!(TaskWeights::parse("4294967295,1,0,0").is_err());
        assert!(TaskWeights::new([u32::MAX / 2, u32::MAX / 2, 1, 1]).is_err());

        let weights = TaskWeights::parse("4294967295,0,0,0").unwrap();
        let selector = TaskSelector::new(weights);
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(selector.select(&mut rng), ChatTask::SimpleCompletion);
    }

    #[test]
    fn test_parse_weights() {
        let weights = TaskWeights::parse("10, 5,3,3").unwrap();
        assert_eq!(weights, TaskWeights::default());
        assert_eq!(weights.total(), 21);
        assert_eq!(weights.weight(ChatTask::MultiTurnCompletion), 5);
    }

    #[test]
    fn test_parse_weights_errors() {
        assert!(TaskWeights::parse("1,2,3").is_err());
        assert!(TaskWeights::parse("1,2,x,3").is_err());
        assert!(TaskWeights::parse("1,2,-3,3").is_err());
        assert!(TaskWeights::parse("0,0,0,0").is_err());
    }

    #[test]
    fn test_default_probabilities() {
        let selector = TaskSelector::new(TaskWeights::default());
        let probabilities = selector.probabilities();

        assert_eq!(probabilities.len(), 4);
        assert_eq!(probabilities[0].0, ChatTask::SimpleCompletion);
        assert!((probabilities[0].1 - 10.0 / 21.0).abs() < 1e-9);
        assert!((probabilities[3].1 - 3.0 / 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let selector = TaskSelector::new(TaskWeights::new([0, 1, 0, 0]).unwrap());
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            assert_eq!(selector.select(&mut rng), ChatTask::MultiTurnCompletion);
        }
    }

    #[test]
    fn test_selection_is_reproducible_with_seed() {
        let selector = TaskSelector::new(TaskWeights::default());
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        let first: Vec<ChatTask> = (0..50).map(|_| selector.select(&mut a)).collect();
        let second: Vec<ChatTask> = (0..50).map(|_| selector.select(&mut b)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_weighted_distribution() {
        let selector = TaskSelector::new(TaskWeights::default());
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts: HashMap<ChatTask, u32> = HashMap::new();

        let iterations = 21_000;
        for _ in 0..iterations {
            *counts.entry(selector.select(&mut rng)).or_insert(0) += 1;
        }

        let simple = counts[&ChatTask::SimpleCompletion] as f64 / iterations as f64;
        let multi = counts[&ChatTask::MultiTurnCompletion] as f64 / iterations as f64;
        let tracked = counts[&ChatTask::UploadAnalyzeDeleteTracked] as f64 / iterations as f64;

        assert!((simple - 10.0 / 21.0).abs() < 0.03, "simple = {}", simple);
        assert!((multi - 5.0 / 21.0).abs() < 0.03, "multi = {}", multi);
        assert!((tracked - 3.0 / 21.0).abs() < 0.03, "tracked = {}", tracked);
    }
}
