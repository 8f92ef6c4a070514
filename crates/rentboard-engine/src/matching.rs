//! Match engine: evaluates newly-approved listings against saved searches.
//!
//! A scan pulls approved ads past the watermark in pages, loads active
//! searches once, and pre-indexes them by price bucket so each ad is only
//! evaluated against searches whose price range can possibly contain it.
//! Evaluation is pure and deterministic: the same inputs always yield the
//! same match set, which makes re-execution after a crash safe.

use std::collections::{HashMap, HashSet};

use rentboard_core::text::{normalize, tokenize};
use tracing::debug;

use crate::error::Result;
use crate::storage::{Ad, Database, SearchQuery};

/// Width of a price bucket in the search pre-index.
const PRICE_BUCKET_WIDTH: f64 = 500.0;
/// Ranges spanning more buckets than this go to the catch-all list instead.
const MAX_BUCKET_SPAN: i64 = 64;

/// One (listing, saved search) hit produced by a scan.
#[derive(Debug, Clone)]
pub struct MatchPair {
    pub ad: Ad,
    pub query: SearchQuery,
}

/// Result of one scan window.
#[derive(Debug, Default)]
pub struct MatchBatch {
    pub pairs: Vec<MatchPair>,
    /// Highest cursor observed among scanned ads; equals the input watermark
    /// when nothing new was found.
    pub max_cursor: i64,
}

pub struct MatchEngine {
    db: Database,
    page_size: u32,
}

impl MatchEngine {
    pub const fn new(db: Database, page_size: u32) -> Self {
        Self { db, page_size }
    }

    /// Scan approved listings with `match_cursor > since_watermark` against
    /// all active saved searches.
    pub async fn find_matches(&self, since_watermark: i64) -> Result<MatchBatch> {
        let queries = self.db.list_active_queries().await?;
        let index = QueryIndex::build(&queries);

        let mut batch = MatchBatch {
            pairs: Vec::new(),
            max_cursor: since_watermark,
        };
        let mut offset = 0u32;

        loop {
            let page = self
                .db
                .list_approved_ads_since(since_watermark, self.page_size, offset)
                .await?;
            let page_len = page.len();

            for ad in page {
                batch.max_cursor = batch.max_cursor.max(ad.match_cursor);
                let tokens: HashSet<String> =
                    tokenize(&format!("{} {}", ad.title, ad.description))
                        .into_iter()
                        .collect();

                for qi in index.candidates(ad.price) {
                    let query = &queries[qi];
                    if ad_matches(&ad, &tokens, query) {
                        batch.pairs.push(MatchPair {
                            ad: ad.clone(),
                            query: query.clone(),
                        });
                    }
                }
            }

            if page_len < self.page_size as usize {
                break;
            }
            offset += self.page_size;
        }

        debug!(
            since_watermark,
            scanned_to = batch.max_cursor,
            pairs = batch.pairs.len(),
            "Match scan complete"
        );

        Ok(batch)
    }
}

/// Pure predicate: keyword, location, price, and category must all hold.
pub fn ad_matches(ad: &Ad, ad_tokens: &HashSet<String>, query: &SearchQuery) -> bool {
    keyword_matches(ad_tokens, &query.keywords)
        && location_matches(&ad.location, query.location_filter.as_deref())
        && price_matches(ad.price, query.price_min, query.price_max)
        && category_matches(&ad.category_id, query.category_filter.as_deref())
}

/// OR-semantics across tokens; an empty keyword set is vacuously true.
fn keyword_matches(ad_tokens: &HashSet<String>, keywords: &str) -> bool {
    if keywords.is_empty() {
        return true;
    }
    keywords.split_whitespace().any(|k| ad_tokens.contains(k))
}

/// Substring containment after normalization; no filter matches any location.
fn location_matches(location: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| normalize(location).contains(&normalize(f)))
}

/// Inclusive range; an unset bound is unbounded.
fn price_matches(price: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.is_none_or(|m| price >= m) && max.is_none_or(|m| price <= m)
}

fn category_matches(category_id: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| f == category_id)
}

/// Saved searches pre-indexed by price bucket so a scan does not pay the
/// full ads × searches cross product.
struct QueryIndex {
    buckets: HashMap<i64, Vec<usize>>,
    /// Searches with unbounded or very wide price ranges, checked for every ad.
    wide: Vec<usize>,
}

impl QueryIndex {
    fn build(queries: &[SearchQuery]) -> Self {
        let mut buckets: HashMap<i64, Vec<usize>> = HashMap::new();
        let mut wide = Vec::new();

        for (i, query) in queries.iter().enumerate() {
            match bucket_span(query) {
                Some((lo, hi)) => {
                    for b in lo..=hi {
                        buckets.entry(b).or_default().push(i);
                    }
                }
                None => wide.push(i),
            }
        }

        Self { buckets, wide }
    }

    /// Indices of searches whose price range can contain `price`, plus the
    /// catch-all list. A superset of the true matches by construction.
    fn candidates(&self, price: f64) -> impl Iterator<Item = usize> + '_ {
        self.buckets
            .get(&bucket_of(price))
            .map_or(&[] as &[usize], Vec::as_slice)
            .iter()
            .copied()
            .chain(self.wide.iter().copied())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn bucket_of(price: f64) -> i64 {
    (price / PRICE_BUCKET_WIDTH).floor() as i64
}

/// Bucket range covered by a search, or `None` when it belongs on the
/// catch-all list.
fn bucket_span(query: &SearchQuery) -> Option<(i64, i64)> {
    let hi_price = query.price_max?;
    let lo = bucket_of(query.price_min.unwrap_or(0.0));
    let hi = bucket_of(hi_price);
    if hi - lo >= MAX_BUCKET_SPAN {
        None
    } else {
        Some((lo, hi))
    }
}
