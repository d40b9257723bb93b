use regex::Regex;

use crate::slack::Message;
use crate::{AppError, Result};

pub const SHEETS_LINK_PATTERN: &str = r"https://docs\.google\.com/spreadsheets/d/[\w-]+";

/// Placeholder reported when no message in a conversation carries a link.
pub const NO_LINK: &str = "No link";

#[derive(Debug, Clone)]
pub struct LinkExtractor {
    pattern: Regex,
}

impl LinkExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(SHEETS_LINK_PATTERN)
            .map_err(|e| AppError::InvalidPattern(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// All spreadsheet links in message order, never empty: the
    /// single-element `[NO_LINK]` list stands in for "nothing found".
    pub fn extract_links(&self, messages: &[Message]) -> Vec<String> {
        let links = self.find_links(messages);
        if links.is_empty() {
            vec![NO_LINK.to_string()]
        } else {
            links
        }
    }

    /// Matches only, possibly empty.
    pub fn find_links(&self, messages: &[Message]) -> Vec<String> {
        messages
            .iter()
            .flat_map(|msg| self.pattern.find_iter(msg.text()))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}
