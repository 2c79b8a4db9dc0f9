use crate::CrawlerError;
use itertools::Itertools;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// One column of the export, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Field {
    Name,
    Description,
    Category,
    Blockchain,
    Device,
    Status,
    #[serde(rename = "NFT")]
    Nft,
    #[serde(rename = "F2P")]
    F2p,
    #[serde(rename = "P2E")]
    P2e,
    #[serde(rename = "P2E_Score")]
    P2eScore,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Name,
        Field::Description,
        Field::Category,
        Field::Blockchain,
        Field::Device,
        Field::Status,
        Field::Nft,
        Field::F2p,
        Field::P2e,
        Field::P2eScore,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Description => "Description",
            Field::Category => "Category",
            Field::Blockchain => "Blockchain",
            Field::Device => "Device",
            Field::Status => "Status",
            Field::Nft => "NFT",
            Field::F2p => "F2P",
            Field::P2e => "P2E",
            Field::P2eScore => "P2E_Score",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for Field {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.column_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CrawlerError::UnknownColumn(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub name: String,
    pub description: String,
    pub category: String,
    pub blockchain: String,
    pub device: String,
    pub status: String,
    pub nft: String,
    pub f2p: String,
    pub p2e: String,
    pub p2e_score: String,
}

impl GameRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Description => &self.description,
            Field::Category => &self.category,
            Field::Blockchain => &self.blockchain,
            Field::Device => &self.device,
            Field::Status => &self.status,
            Field::Nft => &self.nft,
            Field::F2p => &self.f2p,
            Field::P2e => &self.p2e,
            Field::P2eScore => &self.p2e_score,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Description => &mut self.description,
            Field::Category => &mut self.category,
            Field::Blockchain => &mut self.blockchain,
            Field::Device => &mut self.device,
            Field::Status => &mut self.status,
            Field::Nft => &mut self.nft,
            Field::F2p => &mut self.f2p,
            Field::P2e => &mut self.p2e,
            Field::P2eScore => &mut self.p2e_score,
        };
        *slot = value;
    }

    /// Overlays the non-empty fields of `overlay` on top of `self`.
    ///
    /// `self` is the listing-row record and `overlay` the detail-page record.
    /// This applies to `name` as well, so a detail page title replaces the
    /// listing name only when the page has one.
    pub fn merge(mut self, overlay: GameRecord) -> GameRecord {
        for field in Field::ALL {
            let value = overlay.get(field).trim();
            if !value.is_empty() {
                self.set(field, value.to_string());
            }
        }
        self
    }

    /// Values in the order of `columns`, as written to a tabular sink.
    pub fn row(&self, columns: &[Field]) -> Vec<&str> {
        columns.iter().map(|c| self.get(*c)).collect()
    }
}

impl fmt::Display for GameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in Field::ALL {
            let value = self.get(field);
            writeln!(
                f,
                "{:<16}: {}",
                field.column_name(),
                if value.is_empty() { "-" } else { value }
            )?;
        }
        Ok(())
    }
}

/// Joins tokens as a list-valued field: trimmed, comma-split, no empties, no repeats.
pub fn join_tokens<'a, I>(values: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unique()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn listing() -> GameRecord {
        GameRecord {
            name: "GameX".to_string(),
            category: "Action, RPG".to_string(),
            blockchain: "Ethereum".to_string(),
            status: "Live".to_string(),
            p2e: "None".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_overlay_wins_when_non_empty() {
        let overlay = GameRecord {
            name: "Game X Deluxe".to_string(),
            description: "A great game.".to_string(),
            blockchain: "Ethereum, Polygon".to_string(),
            ..Default::default()
        };

        let merged = listing().merge(overlay);
        assert_eq!(
            merged,
            GameRecord {
                name: "Game X Deluxe".to_string(),
                description: "A great game.".to_string(),
                category: "Action, RPG".to_string(),
                blockchain: "Ethereum, Polygon".to_string(),
                status: "Live".to_string(),
                p2e: "None".to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_merge_empty_overlay_is_noop() {
        assert_eq!(listing().merge(GameRecord::default()), listing());

        let blank = GameRecord {
            name: "   ".to_string(),
            status: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(listing().merge(blank), listing());
    }

    #[test]
    fn test_join_tokens() {
        assert_eq!(
            join_tokens(["BNB Chain, Ethereum", " ", "Ethereum", "  Polygon "]),
            "BNB Chain, Ethereum, Polygon"
        );
        assert_eq!(join_tokens(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_field_from_str() {
        assert_eq!("p2e_score".parse::<Field>().unwrap(), Field::P2eScore);
        assert_eq!(" NFT ".parse::<Field>().unwrap(), Field::Nft);
        assert!(matches!(
            "Price".parse::<Field>(),
            Err(CrawlerError::UnknownColumn(c)) if c == "Price"
        ));
    }

    #[test]
    fn test_row_follows_column_order() {
        let r = listing();
        assert_eq!(
            r.row(&[Field::Status, Field::Name, Field::F2p]),
            vec!["Live", "GameX", ""]
        );
    }
}
