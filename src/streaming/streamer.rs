// Paced row streamer
//
// Pulls rows one by one from a RowSource and hands each projected row to a
// callback. A fixed delay between rows turns a finished historical batch into
// something that can be listened to in real time.
//
// Stopping is cooperative: the stop token is checked once per pulled row. A
// pace wait that already started runs to the end, so after a stop at most one
// more row can still reach the callback.

use super::source::RowSource;
use super::types::{FieldValueSet, Row, StreamError, StreamResult, StreamSummary};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Default delay between rows
pub const DEFAULT_PACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
pub struct RowStreamer {
    pace: Duration,
}

impl Default for RowStreamer {
    fn default() -> Self {
        Self::new(DEFAULT_PACE)
    }
}

impl RowStreamer {
    pub fn new(pace: Duration) -> Self {
        Self { pace }
    }

    pub fn pace(&self) -> Duration {
        self.pace
    }

    /// Stream rows until the source is exhausted or `stop` is cancelled.
    ///
    /// A source error aborts the pass; the partial summary is dropped.
    pub async fn stream<F>(
        &self,
        source: &mut dyn RowSource,
        selected: &[String],
        stop: &CancellationToken,
        mut on_row: F,
    ) -> StreamResult<StreamSummary>
    where
        F: FnMut(&FieldValueSet, &Row),
    {
        if selected.is_empty() {
            return Err(StreamError::NoFieldsSelected);
        }

        let mut summary = StreamSummary::for_fields(selected);

        loop {
            // A pull that is still waiting on the source is abandoned on stop
            let pulled = tokio::select! {
                biased;

                _ = stop.cancelled() => None,
                row = source.next_row() => Some(row),
            };

            let row = match pulled {
                None => break,
                Some(result) => match result? {
                    Some(row) => row,
                    None => break,
                },
            };

            if stop.is_cancelled() {
                break;
            }

            if !self.pace.is_zero() {
                sleep(self.pace).await;
            }

            let values = FieldValueSet::project(&row, selected);
            summary.record(&values);
            log::debug!("row {} @ {}: {:?}", summary.total_rows, row.timestamp, values);

            on_row(&values, &row);
        }

        if stop.is_cancelled() {
            log::info!("Stream stopped after {} rows", summary.total_rows);
        } else {
            log::info!("Stream completed. Total rows: {}", summary.total_rows);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::source::MemoryRowSource;
    use async_trait::async_trait;
    use tokio::time::Instant;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn rows(count: i64) -> Vec<Row> {
        (0..count)
            .map(|i| Row::new(1000 * i).with_field("temperatura", 20.0 + i as f64))
            .collect()
    }

    struct StalledSource;

    #[async_trait]
    impl RowSource for StalledSource {
        async fn next_row(&mut self) -> StreamResult<Option<Row>> {
            std::future::pending().await
        }

        fn describe(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_row_in_order() {
        let mut source = MemoryRowSource::new(rows(4));
        let stop = CancellationToken::new();
        let mut seen = Vec::new();

        let summary = RowStreamer::new(Duration::ZERO)
            .stream(&mut source, &fields(&["temperatura", "humedad"]), &stop, |_, row| {
                seen.push(row.timestamp)
            })
            .await
            .unwrap();

        assert_eq!(seen, vec![0, 1000, 2000, 3000]);
        assert_eq!(summary.total_rows, 4);
        assert_eq!(summary.rows_by_field.get("temperatura"), Some(&4));
        assert_eq!(summary.rows_by_field.get("humedad"), Some(&0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pace_between_rows() {
        let mut source = MemoryRowSource::new(rows(5));
        let stop = CancellationToken::new();
        let started = Instant::now();

        RowStreamer::new(Duration::from_millis(100))
            .stream(&mut source, &fields(&["temperatura"]), &stop, |_, _| {})
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_callback() {
        let mut source = MemoryRowSource::new(rows(10));
        let stop = CancellationToken::new();
        let mut calls = 0;

        let summary = RowStreamer::new(Duration::from_millis(10))
            .stream(&mut source, &fields(&["temperatura"]), &stop, |_, _| {
                calls += 1;
                if calls == 2 {
                    stop.cancel();
                }
            })
            .await
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(summary.total_rows, 2);
        // Stop is seen before the next pull
        assert_eq!(source.remaining(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_stopped() {
        let mut source = MemoryRowSource::new(rows(3));
        let stop = CancellationToken::new();
        stop.cancel();

        let summary = RowStreamer::default()
            .stream(&mut source, &fields(&["temperatura"]), &stop, |_, _| {
                panic!("no row expected")
            })
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 0);
        assert_eq!(source.remaining(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_error_discards_summary() {
        let mut source = MemoryRowSource::new(rows(5)).fail_after(2, "connection reset");
        let stop = CancellationToken::new();
        let mut calls = 0;

        let result = RowStreamer::new(Duration::ZERO)
            .stream(&mut source, &fields(&["temperatura"]), &stop, |_, _| calls += 1)
            .await;

        assert!(matches!(result, Err(StreamError::Connection(_))));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_stalled_source() {
        let mut source = StalledSource;
        let stop = CancellationToken::new();

        let canceller = stop.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let summary = RowStreamer::default()
            .stream(&mut source, &fields(&["gas"]), &stop, |_, _| {})
            .await
            .unwrap();
        assert_eq!(summary.total_rows, 0);
    }

    #[tokio::test]
    async fn test_requires_fields() {
        let mut source = MemoryRowSource::new(rows(1));
        let result = RowStreamer::default()
            .stream(&mut source, &[], &CancellationToken::new(), |_, _| {})
            .await;
        assert!(matches!(result, Err(StreamError::NoFieldsSelected)));
    }
}
