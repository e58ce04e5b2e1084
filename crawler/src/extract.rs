use anyhow::{anyhow, bail, Result};
use scrape_core::{PageExtractor, RawDetail, RawListing};
use scraper::{ElementRef, Html, Selector};
use url::Url;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).map(text_of).find(|t| !t.is_empty())
}

/// Selectors for Amazon-style search result and product pages.
pub struct ProductPageExtractor {
    base: Url,
    search: Url,
    listing_root: Selector,
    result: Selector,
    result_title: Selector,
    result_link: Selector,
    product_root: Selector,
    title: Selector,
    price: Selector,
    rating: Selector,
    reviews: Selector,
    bullets: Selector,
}

impl ProductPageExtractor {
    pub fn new(site: &str) -> Result<Self> {
        let base = Url::parse(site)?;
        let search = base.join("/s")?;
        Ok(Self {
            base,
            search,
            listing_root: selector("div.s-main-slot, #search")?,
            result: selector(r#"div[data-component-type="s-search-result"]"#)?,
            result_title: selector("h2")?,
            result_link: selector("h2 a, a.a-link-normal.s-no-outline")?,
            product_root: selector("#dp, #productTitle")?,
            title: selector("#productTitle")?,
            price: selector(".a-price .a-offscreen, #priceblock_ourprice, #corePrice_feature_div .a-offscreen")?,
            rating: selector(r#"#acrPopover .a-icon-alt, span[data-hook="rating-out-of-text"]"#)?,
            reviews: selector("#acrCustomerReviewText")?,
            bullets: selector("#feature-bullets li")?,
        })
    }
}

impl PageExtractor for ProductPageExtractor {
    fn listing_url(&self, term: &str, page: u32) -> String {
        let mut url = self.search.clone();
        url.query_pairs_mut().append_pair("k", term).append_pair("page", &page.to_string());
        url.to_string()
    }

    fn extract_listing(&self, html: &str) -> Result<Vec<RawListing>> {
        let doc = Html::parse_document(html);
        if doc.select(&self.listing_root).next().is_none() {
            bail!("search results container missing");
        }
        let mut out = Vec::new();
        for item in doc.select(&self.result) {
            let title = item.select(&self.result_title).next().map(text_of);
            let url = item
                .select(&self.result_link)
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| self.base.join(href).ok())
                .map(|u| u.to_string());
            out.push(RawListing { title, url });
        }
        Ok(out)
    }

    fn extract_detail(&self, html: &str) -> Result<RawDetail> {
        let doc = Html::parse_document(html);
        if doc.select(&self.product_root).next().is_none() {
            bail!("product container missing");
        }
        let bullets: Vec<String> = doc.select(&self.bullets).map(text_of).filter(|t| !t.is_empty()).collect();
        Ok(RawDetail {
            title: first_text(&doc, &self.title),
            price: first_text(&doc, &self.price),
            rating: first_text(&doc, &self.rating),
            review_count: first_text(&doc, &self.reviews),
            details: (!bullets.is_empty()).then(|| bullets.join(" | ")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrape_core::{DetailRecord, SearchRecord};

    fn extractor() -> ProductPageExtractor {
        ProductPageExtractor::new("https://www.example.com").unwrap()
    }

    #[test]
    fn listing_url_carries_term_and_page() {
        let url = extractor().listing_url("usb hub", 3);
        assert_eq!(url, "https://www.example.com/s?k=usb+hub&page=3");
    }

    #[test]
    fn reads_search_results() {
        let html = r#"<html><body><div class="s-main-slot">
            <div data-component-type="s-search-result">
              <h2><a href="/dp/B001?ref=sr"><span> USB   Hub 4-port </span></a></h2>
            </div>
            <div data-component-type="s-search-result">
              <h2><span>Sponsored thing</span></h2>
            </div>
            <div class="ad">not a result</div>
        </div></body></html>"#;
        let items = extractor().extract_listing(html).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("USB Hub 4-port"));
        assert_eq!(items[0].url.as_deref(), Some("https://www.example.com/dp/B001?ref=sr"));
        let second = SearchRecord::validate(items[1].clone());
        assert_eq!(second.url, "No URL");
    }

    #[test]
    fn blocked_page_is_an_error() {
        let html = "<html><body><form action='/errors/validateCaptcha'></form></body></html>";
        assert!(extractor().extract_listing(html).is_err());
        assert!(extractor().extract_detail(html).is_err());
    }

    #[test]
    fn reads_product_page() {
        let html = r#"<html><body><div id="dp">
            <span id="productTitle">  Electric Kettle  </span>
            <span class="a-price"><span class="a-offscreen">$1,299.99</span></span>
            <div id="acrPopover"><span class="a-icon-alt">4.6 out of 5 stars</span></div>
            <span id="acrCustomerReviewText">12,345 ratings</span>
            <div id="feature-bullets"><ul><li> Auto shut-off </li><li>1.7 L</li></ul></div>
        </div></body></html>"#;
        let rec = DetailRecord::validate(extractor().extract_detail(html).unwrap());
        assert_eq!(rec.title, "Electric Kettle");
        assert_eq!(rec.price, 1299.99);
        assert_eq!(rec.rating, 4.6);
        assert_eq!(rec.review_count, 12345);
        assert_eq!(rec.details, "Auto shut-off | 1.7 L");
    }

    #[test]
    fn missing_fields_fall_back() {
        let html = r#"<html><body><div id="dp"><span id="productTitle">Kettle</span></div></body></html>"#;
        let rec = DetailRecord::validate(extractor().extract_detail(html).unwrap());
        assert_eq!(rec.price, 0.0);
        assert_eq!(rec.rating, 0.0);
        assert_eq!(rec.review_count, 0);
        assert_eq!(rec.details, "No details");
    }
}
