use std::sync::atomic::{AtomicUsize, Ordering};

/// Live per-operation counters.
#[derive(Debug, Default)]
pub(crate) struct OperationStats {
    gets: AtomicUsize,
    queries: AtomicUsize,
    index_queries: AtomicUsize,
    scans: AtomicUsize,
    writes: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Operation {
    Get,
    Query,
    IndexQuery,
    Scan,
    Write,
}

impl OperationStats {
    pub(crate) fn record(&self, operation: Operation) {
        let counter = match operation {
            Operation::Get => &self.gets,
            Operation::Query => &self.queries,
            Operation::IndexQuery => &self.index_queries,
            Operation::Scan => &self.scans,
            Operation::Write => &self.writes,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> OperationCounts {
        OperationCounts {
            gets: self.gets.load(Ordering::SeqCst),
            queries: self.queries.load(Ordering::SeqCst),
            index_queries: self.index_queries.load(Ordering::SeqCst),
            scans: self.scans.load(Ordering::SeqCst),
            writes: self.writes.load(Ordering::SeqCst),
        }
    }
}

/// Number of store operations performed, by access path.
///
/// `queries` counts key-condition queries on the table or a local index;
/// `index_queries` counts queries on global indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub queries: usize,
    pub index_queries: usize,
    pub scans: usize,
    pub writes: usize,
}

impl OperationCounts {
    /// Read operations of any kind.
    pub fn reads(&self) -> usize {
        self.gets + self.queries + self.index_queries + self.scans
    }

    pub fn total(&self) -> usize {
        self.reads() + self.writes
    }

    /// Operations performed since `earlier`.
    pub fn since(&self, earlier: &OperationCounts) -> OperationCounts {
        OperationCounts {
            gets: self.gets - earlier.gets,
            queries: self.queries - earlier.queries,
            index_queries: self.index_queries - earlier.index_queries,
            scans: self.scans - earlier.scans,
            writes: self.writes - earlier.writes,
        }
    }
}
