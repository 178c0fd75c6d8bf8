// Content Fallback Resolver
//
// Resolves multilingual product content (slogans, descriptions, policies) through a
// specificity chain: exact channel/variant, channel default variant, product-wide
// common row, and finally any row for the language when no common row exists.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use utoipa::ToSchema;

use crate::engine::types::ProductId;

/// Variant key used when a product has no channel-specific purchase variants
pub const DEFAULT_VARIANT: &str = "default";

/// Channel column value shared by every self-operated storefront channel
pub const SELF_OPERATED_CHANNEL: &str = "self_operated";

static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup pattern"));

/// Group of fields stored together in one override row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentSection {
    Details,
    Policies,
}

impl fmt::Display for ContentSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSection::Details => write!(f, "details"),
            ContentSection::Policies => write!(f, "policies"),
        }
    }
}

impl FromStr for ContentSection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "details" => Ok(ContentSection::Details),
            "policies" => Ok(ContentSection::Policies),
            _ => Err(format!("Invalid content section: {}", s)),
        }
    }
}

/// A single text field of product content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
    Slogan1,
    Slogan2,
    Slogan3,
    Description,
    Included,
    NotIncluded,
    MeetingPoint,
    CancellationPolicy,
    RefundPolicy,
    Caution,
}

impl ContentField {
    pub const ALL: [ContentField; 10] = [
        ContentField::Slogan1,
        ContentField::Slogan2,
        ContentField::Slogan3,
        ContentField::Description,
        ContentField::Included,
        ContentField::NotIncluded,
        ContentField::MeetingPoint,
        ContentField::CancellationPolicy,
        ContentField::RefundPolicy,
        ContentField::Caution,
    ];

    pub fn section(&self) -> ContentSection {
        match self {
            ContentField::CancellationPolicy
            | ContentField::RefundPolicy
            | ContentField::Caution => ContentSection::Policies,
            _ => ContentSection::Details,
        }
    }

    /// Fields stored in the given section, in display order
    pub fn in_section(section: ContentSection) -> impl Iterator<Item = ContentField> {
        Self::ALL.into_iter().filter(move |field| field.section() == section)
    }
}

/// Channel scope of an override row
///
/// `Common` is the product-wide default (NULL channel column). Every channel in
/// the self-operated group maps onto one shared `SelfOperated` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ChannelScope {
    Common,
    SelfOperated,
    Channel(String),
}

impl ChannelScope {
    /// Map a raw storefront channel id onto its row scope
    pub fn from_channel(channel_id: Option<&str>, self_operated: &HashSet<String>) -> Self {
        match channel_id.map(str::trim).filter(|id| !id.is_empty()) {
            None => ChannelScope::Common,
            Some(SELF_OPERATED_CHANNEL) => ChannelScope::SelfOperated,
            Some(id) if self_operated.contains(id) => ChannelScope::SelfOperated,
            Some(id) => ChannelScope::Channel(id.to_string()),
        }
    }

    /// Decode the stored channel column
    pub fn from_column(column: Option<String>) -> Self {
        match column {
            None => ChannelScope::Common,
            Some(id) if id == SELF_OPERATED_CHANNEL => ChannelScope::SelfOperated,
            Some(id) => ChannelScope::Channel(id),
        }
    }

    /// Value written to the channel column
    pub fn column_value(&self) -> Option<&str> {
        match self {
            ChannelScope::Common => None,
            ChannelScope::SelfOperated => Some(SELF_OPERATED_CHANNEL),
            ChannelScope::Channel(id) => Some(id.as_str()),
        }
    }

    pub fn is_common(&self) -> bool {
        matches!(self, ChannelScope::Common)
    }
}

/// One override row for a product section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentOverrideRecord {
    pub product_id: ProductId,
    pub section: ContentSection,
    pub channel: ChannelScope,
    pub variant_key: String,
    pub language_code: String,
    pub fields: BTreeMap<ContentField, String>,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl ContentOverrideRecord {
    fn value(&self, field: ContentField) -> Option<&str> {
        self.fields
            .get(&field)
            .map(String::as_str)
            .filter(|value| has_content(value))
    }

    fn non_empty_tags(&self) -> Option<&[String]> {
        if self.tags.iter().any(|tag| !tag.trim().is_empty()) {
            Some(&self.tags)
        } else {
            None
        }
    }

    fn is_variant(&self, variant_key: &str) -> bool {
        self.variant_key == variant_key
    }
}

/// Strip markup for emptiness checks
///
/// Tags are removed and `&nbsp;` counts as whitespace.
pub fn strip_markup(value: &str) -> String {
    MARKUP.replace_all(value, "").replace("&nbsp;", " ")
}

/// A value counts as present when it has visible text after stripping markup
pub fn has_content(value: &str) -> bool {
    !strip_markup(value).trim().is_empty()
}

/// Fully resolved content for one section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedContent {
    pub fields: BTreeMap<ContentField, String>,
    pub tags: Vec<String>,
}

/// Content Fallback Resolver
///
/// Pure read over the override rows loaded for one product and language.
/// Rows for other languages are ignored by every lookup.
pub struct FallbackResolver<'a> {
    records: Vec<&'a ContentOverrideRecord>,
}

impl<'a> FallbackResolver<'a> {
    /// Create a resolver over the loaded rows
    ///
    /// Rows are ordered by channel then variant so the last-resort lookup is
    /// deterministic regardless of store order.
    pub fn new(records: &'a [ContentOverrideRecord]) -> Self {
        let mut records: Vec<&ContentOverrideRecord> = records.iter().collect();
        records.sort_by(|a, b| {
            (a.channel.column_value(), a.variant_key.as_str())
                .cmp(&(b.channel.column_value(), b.variant_key.as_str()))
        });
        Self { records }
    }

    /// Resolve one field to its effective value, or an empty string
    pub fn resolve(
        &self,
        field: ContentField,
        channel: &ChannelScope,
        variant_key: &str,
        language_code: &str,
    ) -> String {
        self.scoped_value(field, channel, variant_key, language_code)
            .or_else(|| self.common_value(field, language_code))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Resolve the tag list through the same chain
    pub fn resolve_tags(
        &self,
        channel: &ChannelScope,
        variant_key: &str,
        language_code: &str,
    ) -> Vec<String> {
        self.scoped(channel, variant_key, language_code, |record| record.non_empty_tags())
            .or_else(|| self.common(language_code, |record| record.non_empty_tags()))
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Merged view over several selected channels
    ///
    /// Each field takes the first selected channel's value; an empty field falls
    /// through to the next channel for that field only. Fields empty for every
    /// channel fall back to the product-wide chain.
    pub fn merged(
        &self,
        section: ContentSection,
        channels: &[ChannelScope],
        variant_key: &str,
        language_code: &str,
    ) -> ResolvedContent {
        let mut resolved = ResolvedContent::default();

        for field in ContentField::in_section(section) {
            let value = channels
                .iter()
                .find_map(|channel| self.scoped_value(field, channel, variant_key, language_code))
                .or_else(|| self.common_value(field, language_code))
                .unwrap_or_default();
            resolved.fields.insert(field, value.to_string());
        }

        resolved.tags = channels
            .iter()
            .find_map(|channel| {
                self.scoped(channel, variant_key, language_code, |record| record.non_empty_tags())
            })
            .or_else(|| self.common(language_code, |record| record.non_empty_tags()))
            .map(<[String]>::to_vec)
            .unwrap_or_default();

        resolved
    }

    fn scoped_value(
        &self,
        field: ContentField,
        channel: &ChannelScope,
        variant_key: &str,
        language_code: &str,
    ) -> Option<&'a str> {
        self.scoped(channel, variant_key, language_code, |record| record.value(field))
    }

    fn common_value(&self, field: ContentField, language_code: &str) -> Option<&'a str> {
        self.common(language_code, |record| record.value(field))
    }

    /// Levels 1 and 2: exact variant, then the channel's default variant
    fn scoped<T: ?Sized>(
        &self,
        channel: &ChannelScope,
        variant_key: &str,
        language_code: &str,
        pick: impl Fn(&'a ContentOverrideRecord) -> Option<&'a T>,
    ) -> Option<&'a T> {
        if channel.is_common() {
            return None;
        }

        let in_channel = || {
            self.records
                .iter()
                .copied()
                .filter(move |record| record.language_code == language_code && &record.channel == channel)
        };

        in_channel()
            .filter(|record| record.is_variant(variant_key))
            .find_map(&pick)
            .or_else(|| {
                in_channel()
                    .filter(|record| record.is_variant(DEFAULT_VARIANT))
                    .find_map(&pick)
            })
    }

    /// Levels 3 and 4: common row, or any row when the language has no common row
    fn common<T: ?Sized>(
        &self,
        language_code: &str,
        pick: impl Fn(&'a ContentOverrideRecord) -> Option<&'a T>,
    ) -> Option<&'a T> {
        let in_language = || {
            self.records
                .iter()
                .copied()
                .filter(move |record| record.language_code == language_code)
        };

        let mut common_rows = in_language().filter(|record| record.channel.is_common()).peekable();
        if common_rows.peek().is_some() {
            // Prefer the common row's default variant when several exist
            let mut rows: Vec<&ContentOverrideRecord> = common_rows.collect();
            rows.sort_by_key(|record| !record.is_variant(DEFAULT_VARIANT));
            return rows.into_iter().find_map(&pick);
        }

        in_language().find_map(&pick)
    }
}
