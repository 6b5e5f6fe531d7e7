use crate::error::CollectError;
use crate::extractor::{extract_company_details, extract_detail_urls, parse_page_range};
use crate::models::{
    CollectionReport, CollectorOptions, CompanyRecord, ItemOutcome, ListingPage, PageRange,
};
use crate::traits::{PageFetcher, PageRenderer};
use tracing::{error, info, warn};

/// Walks a paginated listing and parses every linked detail page.
///
/// Pages and items are processed one at a time. Failures on a single listing
/// page or detail page are recorded as [`ItemOutcome::Skipped`] and the walk
/// carries on.
pub struct Collector<R, F> {
    renderer: R,
    fetcher: F,
    options: CollectorOptions,
}

impl<R, F> Collector<R, F>
where
    R: PageRenderer + Send + Sync,
    F: PageFetcher + Send + Sync,
{
    pub fn new(renderer: R, fetcher: F, options: CollectorOptions) -> Self {
        Self {
            renderer,
            fetcher,
            options,
        }
    }

    /// Any discovery failure collapses to the single page `1..=1`.
    pub async fn discover_page_range(&self, base_url: &str) -> PageRange {
        match self.read_page_range(base_url).await {
            Ok(range) => range,
            Err(error) => {
                error!(url = %base_url, %error, "pagination discovery failed, using a single page");
                PageRange::single()
            }
        }
    }

    async fn read_page_range(&self, base_url: &str) -> Result<PageRange, CollectError> {
        let html = self
            .renderer
            .render(base_url, self.options.pagination_selector)
            .await?;
        parse_page_range(
            &html,
            self.options.pagination_selector,
            self.options.pagination_link_selector,
        )
    }

    pub fn listing_page(&self, base_url: &str, number: u32) -> ListingPage {
        let separator = if base_url.contains('?') { '&' } else { '?' };
        ListingPage {
            number,
            url: format!(
                "{base_url}{separator}{}={number}",
                self.options.page_query_param
            ),
        }
    }

    pub async fn listing_detail_urls(&self, page: &ListingPage) -> Result<Vec<String>, CollectError> {
        self.fetcher.fetch(&page.url).await?;
        let html = self
            .renderer
            .render(&page.url, self.options.listing_item_selector)
            .await?;
        extract_detail_urls(&html, &page.url, self.options.listing_item_selector)
    }

    pub async fn collect_detail(&self, url: &str, page: u32) -> Result<CompanyRecord, CollectError> {
        let html = self.fetcher.fetch(url).await?;
        let mut record = extract_company_details(&html)?;
        record.source_url = Some(url.to_string());
        record.page = Some(page);
        Ok(record)
    }

    pub async fn collect(&self, base_url: &str) -> CollectionReport {
        let range = self.discover_page_range(base_url).await;
        info!(first = range.first, last = range.last, "discovered listing pages");

        let mut report = CollectionReport {
            range,
            ..Default::default()
        };

        for number in range.pages() {
            let page = self.listing_page(base_url, number);
            info!(url = %page.url, "processing listing page");

            let detail_urls = match self.listing_detail_urls(&page).await {
                Ok(urls) => urls,
                Err(error) => {
                    warn!(url = %page.url, %error, "skipping listing page");
                    report.outcomes.push(ItemOutcome::Skipped {
                        url: page.url,
                        page: number,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };
            info!(
                page = number,
                last = range.last,
                companies = detail_urls.len(),
                "listing page processed"
            );

            for url in detail_urls {
                match self.collect_detail(&url, number).await {
                    Ok(record) => {
                        report.records.push(record);
                        report.outcomes.push(ItemOutcome::Collected { url, page: number });
                    }
                    Err(error) => {
                        warn!(url = %url, %error, "skipping company page");
                        report.outcomes.push(ItemOutcome::Skipped {
                            url,
                            page: number,
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            companies = report.records.len(),
            skipped = report.skipped().count(),
            "collection finished"
        );
        report
    }
}
