//! Streaming Body Filter
//!
//! CRITICAL: This filter does NOT accumulate the body.
//! Each chunk is rewritten as it arrives and handed straight back to the
//! host. Memory usage is bounded by the carryover capacity regardless of
//! body size.

use log::debug;
use std::sync::Arc;

use super::engine::HtmlFilter;
use super::rules::FilterRules;

/// One response body flowing through the HTML filter
pub struct StreamingBodyFilter {
    engine: HtmlFilter,
    /// Bytes received from upstream
    bytes_in: usize,
    /// Bytes handed back to the host
    bytes_out: usize,
    /// Number of chunks seen
    chunks: usize,
    /// Bytes of an unfinished tag dropped at end of stream
    bytes_dropped: usize,
    /// Whether end of stream was seen
    complete: bool,
}

impl StreamingBodyFilter {
    /// Start filtering a new document
    pub fn new(rules: Arc<FilterRules>, carryover_capacity: usize) -> Self {
        let mut engine = HtmlFilter::with_rules(rules, carryover_capacity);
        engine.reset_state();

        Self {
            engine,
            bytes_in: 0,
            bytes_out: 0,
            chunks: 0,
            bytes_dropped: 0,
            complete: false,
        }
    }

    /// Filter one body chunk in place.
    ///
    /// Call this for each chunk received. O(n) time where n is chunk size.
    pub fn on_body_chunk(&mut self, chunk: &mut Vec<u8>, end_of_stream: bool) {
        if self.complete {
            return;
        }

        self.chunks += 1;
        self.bytes_in += chunk.len();
        self.bytes_out += self.engine.filter_chunk(chunk);

        if end_of_stream {
            // An unfinished tag at end of document is malformed input
            self.bytes_dropped = self.engine.discard_carryover();
            if self.bytes_dropped > 0 {
                debug!(
                    "Dropped {} bytes of an unfinished tag at end of document",
                    self.bytes_dropped
                );
            }
            self.complete = true;
        }
    }

    pub fn bytes_in(&self) -> usize {
        self.bytes_in
    }

    pub fn bytes_out(&self) -> usize {
        self.bytes_out
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn bytes_dropped(&self) -> usize {
        self.bytes_dropped
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_filter(spec: &str) -> StreamingBodyFilter {
        StreamingBodyFilter::new(Arc::new(FilterRules::parse(spec)), 64)
    }

    #[test]
    fn test_counts_bytes() {
        let mut filter = body_filter("dt=script");

        let mut first = b"<p>Hello <scr".to_vec();
        filter.on_body_chunk(&mut first, false);
        assert_eq!(first, b"<p>Hello ");

        let mut second = b"ipt>x</script>world</p>".to_vec();
        filter.on_body_chunk(&mut second, true);
        assert_eq!(second, b"world</p>");

        assert_eq!(filter.chunks(), 2);
        assert_eq!(filter.bytes_in(), 13 + 23);
        assert_eq!(filter.bytes_out(), 9 + 9);
        assert!(filter.is_complete());
    }

    #[test]
    fn test_unfinished_tag_dropped_at_end() {
        let mut filter = body_filter("dt=script");
        let mut chunk = b"text <unfinis".to_vec();
        filter.on_body_chunk(&mut chunk, true);
        assert_eq!(chunk, b"text ");
        assert_eq!(filter.bytes_dropped(), 8);
    }

    #[test]
    fn test_ignores_chunks_after_end() {
        let mut filter = body_filter("dt=script");
        let mut last = b"done".to_vec();
        filter.on_body_chunk(&mut last, true);

        let mut extra = b"<script>".to_vec();
        filter.on_body_chunk(&mut extra, false);
        assert_eq!(extra, b"<script>");
        assert_eq!(filter.chunks(), 1);
    }
}
