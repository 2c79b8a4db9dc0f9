mod crawler;
mod data;

pub use crawler::PlayToEarnCrawler;
pub use data::{GameTable, PlayToEarnData};
