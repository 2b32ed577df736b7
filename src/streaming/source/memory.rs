// In-memory row source

use super::RowSource;
use crate::streaming::types::{Row, StreamError, StreamResult};
use async_trait::async_trait;
use std::collections::VecDeque;

/// Yields a fixed list of rows, optionally failing after a number of them
pub struct MemoryRowSource {
    rows: VecDeque<Row>,
    fail_after: Option<(usize, String)>,
    pulled: usize,
}

impl MemoryRowSource {
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            fail_after: None,
            pulled: 0,
        }
    }

    /// Raise a connection error instead of the row at index `count`
    pub fn fail_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn next_row(&mut self) -> StreamResult<Option<Row>> {
        if let Some((count, message)) = &self.fail_after {
            if self.pulled >= *count {
                return Err(StreamError::Connection(message.clone()));
            }
        }
        self.pulled += 1;
        Ok(self.rows.pop_front())
    }

    fn describe(&self) -> String {
        format!("memory ({} rows)", self.rows.len())
    }
}
