//! Granule planning shared by all column writers of a part
//!
//! Every column of a part must cut granules at the same rows, so the plan is
//! computed once per block and handed to each writer.

use mergepart_config::WriterSettings;

/// How many rows go into one granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexGranularityPolicy {
    /// Upper bound on rows per granule
    pub rows: usize,
    /// Approximate bytes per granule; `None` means fixed granularity
    pub bytes: Option<usize>,
}

impl IndexGranularityPolicy {
    pub fn fixed(rows: usize) -> Self {
        Self {
            rows: rows.max(1),
            bytes: None,
        }
    }

    pub fn from_settings(settings: &WriterSettings) -> Self {
        Self {
            rows: settings.index_granularity.max(1),
            bytes: settings
                .is_adaptive_granularity()
                .then_some(settings.index_granularity_bytes),
        }
    }

    /// Granule size for a block, estimated from its average row width
    pub fn rows_for_block(&self, block_rows: usize, block_bytes: usize) -> usize {
        match self.bytes {
            Some(bytes) if block_rows > 0 && block_bytes > 0 => {
                let row_bytes = (block_bytes / block_rows).max(1);
                (bytes / row_bytes).clamp(1, self.rows)
            }
            _ => self.rows,
        }
    }
}

/// Row counts of every granule written to a part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexGranularity {
    marks: Vec<usize>,
}

impl IndexGranularity {
    pub fn marks_count(&self) -> usize {
        self.marks.len()
    }

    pub fn total_rows(&self) -> usize {
        self.marks.iter().sum()
    }

    pub fn rows_in_granule(&self, index: usize) -> Option<usize> {
        self.marks.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.marks.iter().copied()
    }

    fn push(&mut self, rows: usize) {
        self.marks.push(rows);
    }
}

/// Slice of a block that lands in a single granule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GranuleSlice {
    pub offset: usize,
    pub rows: usize,
    /// First rows of a new granule
    pub starts_granule: bool,
    /// The granule is complete after this slice
    pub closes_granule: bool,
}

/// Cuts incoming blocks into granules, carrying a partial granule across blocks
#[derive(Debug, Clone)]
pub struct GranulePlanner {
    policy: IndexGranularityPolicy,
    open_rows: usize,
    open_target: usize,
    granularity: IndexGranularity,
}

impl GranulePlanner {
    pub fn new(policy: IndexGranularityPolicy) -> Self {
        Self {
            policy,
            open_rows: 0,
            open_target: 0,
            granularity: IndexGranularity::default(),
        }
    }

    pub fn plan(&mut self, block_rows: usize, block_bytes: usize) -> Vec<GranuleSlice> {
        let mut slices = Vec::new();
        let mut offset = 0;

        while offset < block_rows {
            let starts_granule = self.open_rows == 0;
            if starts_granule {
                self.open_target = self.policy.rows_for_block(block_rows, block_bytes);
            }

            let rows = (self.open_target - self.open_rows).min(block_rows - offset);
            self.open_rows += rows;

            let closes_granule = self.open_rows == self.open_target;
            if closes_granule {
                self.granularity.push(self.open_rows);
                self.open_rows = 0;
            }

            slices.push(GranuleSlice {
                offset,
                rows,
                starts_granule,
                closes_granule,
            });
            offset += rows;
        }

        slices
    }

    /// Close the trailing partial granule, returning its row count
    pub fn finish(&mut self) -> Option<usize> {
        if self.open_rows == 0 {
            return None;
        }
        let rows = self.open_rows;
        self.granularity.push(rows);
        self.open_rows = 0;
        Some(rows)
    }

    pub fn granularity(&self) -> &IndexGranularity {
        &self.granularity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_granules_carry_across_blocks() {
        let mut planner = GranulePlanner::new(IndexGranularityPolicy::fixed(4));

        let first = planner.plan(3, 0);
        assert_eq!(
            first,
            vec![GranuleSlice {
                offset: 0,
                rows: 3,
                starts_granule: true,
                closes_granule: false
            }]
        );

        let second = planner.plan(5, 0);
        assert_eq!(second.len(), 2);
        assert_eq!((second[0].offset, second[0].rows), (0, 1));
        assert!(!second[0].starts_granule && second[0].closes_granule);
        assert_eq!((second[1].offset, second[1].rows), (1, 4));
        assert!(second[1].starts_granule && second[1].closes_granule);

        assert_eq!(planner.finish(), None);
        assert_eq!(planner.granularity().iter().collect::<Vec<_>>(), vec![4, 4]);
    }

    #[test]
    fn test_trailing_partial_granule() {
        let mut planner = GranulePlanner::new(IndexGranularityPolicy::fixed(8192));
        planner.plan(3, 0);
        planner.plan(5, 0);

        assert_eq!(planner.finish(), Some(8));
        assert_eq!(planner.granularity().marks_count(), 1);
        assert_eq!(planner.granularity().total_rows(), 8);
    }

    #[test]
    fn test_adaptive_granularity_caps_by_bytes() {
        let policy = IndexGranularityPolicy {
            rows: 8192,
            bytes: Some(1024),
        };
        // 100 rows of 64 bytes each -> 16 rows per granule
        assert_eq!(policy.rows_for_block(100, 6400), 16);
        // Huge rows still get one row per granule
        assert_eq!(policy.rows_for_block(2, 1 << 20), 1);
        // Narrow rows are capped by the row limit
        assert_eq!(policy.rows_for_block(100_000, 100_000), 1024);

        let wide_budget = IndexGranularityPolicy {
            rows: 8192,
            bytes: Some(1 << 30),
        };
        assert_eq!(wide_budget.rows_for_block(100, 800), 8192);
    }

    #[test]
    fn test_from_settings() {
        let settings = WriterSettings {
            index_granularity: 16,
            index_granularity_bytes: 0,
            ..Default::default()
        };
        assert_eq!(
            IndexGranularityPolicy::from_settings(&settings),
            IndexGranularityPolicy::fixed(16)
        );
    }
}
