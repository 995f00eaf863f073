#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: u32,
    pub render_ms: f64,
    pub command_count: usize,
    pub encoded_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSummary {
    pub pages: Vec<PageMetrics>,
    pub failed_pages: Vec<u32>,
    pub total_render_ms: f64,
    pub total_bytes: usize,
}

impl CaptureSummary {
    pub fn record(&mut self, metrics: PageMetrics) {
        self.total_render_ms += metrics.render_ms;
        self.total_bytes += metrics.encoded_bytes;
        self.pages.push(metrics);
    }

    pub fn record_failure(&mut self, page: u32) {
        self.failed_pages.push(page);
    }

    pub fn succeeded(&self) -> bool {
        self.failed_pages.is_empty()
    }
}
