use crate::{
    extract::{extract_record, FieldSpec, Normalize, Query},
    record::{Field, GameRecord},
    Crawler, ListingRow,
};
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const E: &str = "Invalid selector";

const NFT_SUFFIX: &str = " NFT Support";
const F2P_LABELS: &[&str] = &[
    "Free-To-Play",
    "Not Free-To-Play",
    "NFT Required",
    "Crypto Required",
    "Game Required",
];

lazy_static! {
    static ref ROWS: Selector = Selector::parse("tbody.__TableItemsSwiper tr").expect(E);
    static ref DETAIL_LINK: Selector =
        Selector::parse("div.__TextViewGameContainer a.dapp_detaillink").expect(E);

    static ref LISTING_FIELDS: Vec<FieldSpec> = vec![
        FieldSpec::scalar(
            Field::Name,
            vec![
                Query::text("div.__TextViewGameContainer a.dapp_detaillink b"),
                Query::text("div.__TextViewGameContainer a.dapp_detaillink"),
            ],
        ),
        FieldSpec::scalar(
            Field::Description,
            vec![
                Query::text("div.__TextViewGameContainer .__GameDescription"),
                Query::text("div.__TextViewGameContainer p"),
            ],
        ),
        FieldSpec::list(
            Field::Category,
            vec![Query::text("div.__TableCategoryTags a div.__TagItem")],
        ),
        FieldSpec::list(
            Field::Blockchain,
            vec![Query::attr("div.TableGameBlockchainItems a", "title")],
        ),
        FieldSpec::list(
            Field::Device,
            vec![Query::attr("div.TableGameDeviceItems a", "title")],
        ),
        FieldSpec::scalar(
            Field::Status,
            vec![
                Query::text("td a.__ButtonStatusLive"),
                Query::text("td a[class*='__ButtonStatus']"),
            ],
        ),
        FieldSpec::scalar(
            Field::Nft,
            vec![Query::attr("td a.buttonNo[aria-label*='NFT']", "aria-label")],
        )
        .normalize(Normalize::StripSuffix(NFT_SUFFIX)),
        FieldSpec::scalar(
            Field::F2p,
            vec![
                Query::attr("td a[aria-label*='FreeToPlay']", "aria-label"),
                Query::attr("td a[aria-label*='Free-To-Play']", "aria-label"),
            ],
        )
        .normalize(Normalize::AllowList(F2P_LABELS)),
        FieldSpec::list(
            Field::P2e,
            vec![Query::attr("td a.buttonYes[aria-label*='Play-To-Earn']", "aria-label")],
        )
        .or_default("None"),
        FieldSpec::scalar(Field::P2eScore, vec![Query::text("td span.dailychangepercentage")]),
    ];

    // Detail misses stay empty so that the listing value survives the merge.
    static ref DETAIL_FIELDS: Vec<FieldSpec> = vec![
        FieldSpec::scalar(
            Field::Name,
            vec![Query::own_text("h1"), Query::own_text(".game-title")],
        ),
        FieldSpec::scalar(
            Field::Description,
            vec![
                Query::text(".game-description"),
                Query::text(".description p"),
                Query::attr("meta[property='og:description']", "content"),
            ],
        ),
        FieldSpec::list(
            Field::Category,
            vec![Query::text(".categories a"), Query::text(".category")],
        ),
        FieldSpec::list(
            Field::Blockchain,
            vec![
                Query::text(".chain"),
                Query::text(".badge-chain"),
                Query::text(".blockchains a"),
                Query::text(".blockchains"),
            ],
        ),
        FieldSpec::list(
            Field::Device,
            vec![
                Query::text(".device"),
                Query::text(".badge-device"),
                Query::text(".devices a"),
                Query::text(".devices"),
            ],
        ),
        FieldSpec::scalar(
            Field::Status,
            vec![
                Query::text(".status .value"),
                Query::text(".badge-status"),
                Query::text(".status"),
            ],
        ),
        FieldSpec::scalar(
            Field::Nft,
            vec![Query::text(".nft .value"), Query::text(".badge-nft"), Query::text(".nft")],
        )
        .normalize(Normalize::StripSuffix(NFT_SUFFIX)),
        FieldSpec::scalar(
            Field::F2p,
            vec![Query::text(".f2p .value"), Query::text(".badge-f2p"), Query::text(".f2p")],
        )
        .normalize(Normalize::AllowList(F2P_LABELS)),
        FieldSpec::list(
            Field::P2e,
            vec![Query::text(".p2e .value"), Query::text(".badge-p2e"), Query::text(".p2e")],
        ),
        FieldSpec::scalar(
            Field::P2eScore,
            vec![Query::text(".p2e-score"), Query::text(".score"), Query::text(".p2eScore")],
        ),
    ];
}

#[derive(Debug)]
pub struct PlayToEarnCrawler {
    base_url: String,
}

impl PlayToEarnCrawler {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        PlayToEarnCrawler {
            base_url: base_url.into(),
        }
    }

    fn detail_url(&self, row: ElementRef, page_url: &str) -> Option<String> {
        let href = row
            .select(&DETAIL_LINK)
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))?;

        match reqwest::Url::parse(page_url).and_then(|base| base.join(href)) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Ignoring detail link {} on {}: {}", href, page_url, e);
                None
            }
        }
    }
}

impl Crawler for PlayToEarnCrawler {
    fn listing_url(&self, page: u32) -> String {
        let sep = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}p={}", self.base_url, sep, page)
    }

    fn parse_listing(&self, doc: &Html, page_url: &str) -> Vec<ListingRow> {
        doc.select(&ROWS)
            .map(|row| ListingRow {
                record: extract_record(row, &LISTING_FIELDS),
                detail_url: self.detail_url(row, page_url),
            })
            .collect()
    }

    fn parse_detail(&self, doc: &Html) -> GameRecord {
        extract_record(doc.root_element(), &DETAIL_FIELDS)
    }
}
