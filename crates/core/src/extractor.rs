use crate::error::CollectError;
use crate::models::{CompanyRecord, PageRange};
use regex::{Regex, RegexBuilder};
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

pub fn parse_selector(css: &str) -> Result<Selector, CollectError> {
    Selector::parse(css).map_err(|_| CollectError::Selector(css.to_string()))
}

/// Reads the inclusive page range from rendered pagination markup. The last
/// numbered link is the "next" control, so the second-to-last one is the last page.
pub fn parse_page_range(
    html: &str,
    container_css: &str,
    link_css: &str,
) -> Result<PageRange, CollectError> {
    let document = Html::parse_document(html);
    let container = parse_selector(container_css)?;
    let links = parse_selector(link_css)?;

    if document.select(&container).next().is_none() {
        return Err(CollectError::MissingPagination);
    }

    let numbers: Vec<u32> = document
        .select(&links)
        .filter_map(|link| link.value().attr("data-page"))
        .filter_map(|value| value.trim().parse::<u32>().ok())
        .filter(|number| *number > 0)
        .collect();

    let first = numbers.first().copied().unwrap_or(1);
    let last = numbers
        .len()
        .checked_sub(2)
        .and_then(|index| numbers.get(index))
        .copied()
        .unwrap_or(1);

    if last < first {
        return Ok(PageRange::single());
    }
    Ok(PageRange { first, last })
}

/// Collects every item link on a listing page, resolved against `page_url`.
/// Links that do not resolve are logged and left out.
pub fn extract_detail_urls(
    html: &str,
    page_url: &str,
    item_css: &str,
) -> Result<Vec<String>, CollectError> {
    let document = Html::parse_document(html);
    let selector = parse_selector(item_css)?;
    let base = Url::parse(page_url)?;

    let mut urls = Vec::new();
    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() {
            continue;
        }
        match base.join(href) {
            Ok(resolved) => urls.push(resolved.to_string()),
            Err(error) => warn!(page = %page_url, href, %error, "unresolvable listing link"),
        }
    }
    Ok(urls)
}

struct DetailSelectors {
    title: Selector,
    article: Selector,
    website: Selector,
    contact: Selector,
    category_block: Selector,
    paragraph: Selector,
    rich_text: Selector,
    tags_title: Selector,
    tags_list: Selector,
    pill: Selector,
    contact_person: Regex,
    phone: Regex,
    email: Regex,
}

impl DetailSelectors {
    fn new() -> Result<Self, CollectError> {
        Ok(Self {
            title: parse_selector("h1.page-title")?,
            article: parse_selector("article.detail-content")?,
            website: parse_selector("a.link__external")?,
            contact: parse_selector("div.highlight-card__text--main__contact")?,
            category_block: parse_selector("div.highlight-card__text--category")?,
            paragraph: parse_selector("p")?,
            rich_text: parse_selector("div.rte")?,
            tags_title: parse_selector("div.tags-list__title")?,
            tags_list: parse_selector("ul.tags-list__list")?,
            pill: parse_selector("a.pill")?,
            contact_person: RegexBuilder::new(r"contact\s*person:([^+0-9\n]+)")
                .case_insensitive(true)
                .build()
                .map_err(|error| CollectError::Selector(error.to_string()))?,
            phone: Regex::new(r"(\+?\d[\d\s\-\(\)]{7,}\d)")
                .map_err(|error| CollectError::Selector(error.to_string()))?,
            email: Regex::new(r"[\w.-]+@[\w.-]+\.\w+")
                .map_err(|error| CollectError::Selector(error.to_string()))?,
        })
    }
}

/// Parses a company detail page. Each field is looked up on its own, so a
/// missing element only blanks that field.
pub fn extract_company_details(html: &str) -> Result<CompanyRecord, CollectError> {
    let selectors = DetailSelectors::new()?;
    let document = Html::parse_document(html);

    let mut record = CompanyRecord {
        name: document
            .select(&selectors.title)
            .next()
            .map(joined_text)
            .filter(|name| !name.is_empty()),
        ..Default::default()
    };

    let Some(article) = document.select(&selectors.article).next() else {
        return Ok(record);
    };

    record.website_url = article
        .select(&selectors.website)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(|href| href.trim().to_string());

    if let Some(contact) = article.select(&selectors.contact).next() {
        let text = joined_text(contact);
        record.contact_person = selectors
            .contact_person
            .captures(&text)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().trim().to_string())
            .filter(|person| !person.is_empty());
        record.contact_number = selectors
            .phone
            .captures(&text)
            .and_then(|captures| captures.get(1))
            .map(|found| found.as_str().trim().to_string());
        record.contact_email = selectors
            .email
            .find(&text)
            .map(|found| found.as_str().trim().to_string());
    }

    if let Some(block) = article.select(&selectors.category_block).next() {
        for paragraph in block.select(&selectors.paragraph) {
            let text = joined_text(paragraph);
            let lowered = text.to_lowercase();
            let value = text.rsplit(':').next().unwrap_or_default().trim().to_string();
            if lowered.contains("sub-category:") {
                record.subcategory = Some(value);
            } else if lowered.contains("category:") {
                record.category = Some(value);
            }
        }
    }

    if let Some(body) = article.select(&selectors.rich_text).next() {
        record.description = body
            .select(&selectors.paragraph)
            .map(joined_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
    }

    if let Some(list) = tags_list_after_title(article, &selectors) {
        record.tags = list
            .select(&selectors.pill)
            .map(joined_text)
            .filter(|tag| !tag.is_empty())
            .collect();
    }

    Ok(record)
}

fn tags_list_after_title<'a>(
    article: ElementRef<'a>,
    selectors: &DetailSelectors,
) -> Option<ElementRef<'a>> {
    let mut seen_title = false;
    for element in article.descendants().filter_map(ElementRef::wrap) {
        if !seen_title {
            seen_title = selectors.tags_title.matches(&element);
        } else if selectors.tags_list.matches(&element) {
            return Some(element);
        }
    }
    None
}

fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
