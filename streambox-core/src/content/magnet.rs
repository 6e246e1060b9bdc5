//! Magnet URI parsing

use url::Url;
use url::form_urlencoded;

use super::InfoHash;
use crate::StreamboxError;

const BTIH_PREFIX: &str = "urn:btih:";

/// Parsed magnet URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
    /// URI as supplied by the caller, handed to the swarm unchanged.
    pub uri: String,
}

impl MagnetLink {
    /// Parses a magnet URI and extracts its normalized info hash.
    ///
    /// The first `xt=urn:btih:` topic wins; `dn` and `tr` are optional.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidIdentifier` - Not a magnet URI, or no valid btih topic
    pub fn parse(input: &str) -> Result<Self, StreamboxError> {
        let invalid = || StreamboxError::InvalidIdentifier {
            input: input.to_string(),
        };

        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|_| invalid())?;
        if url.scheme() != "magnet" {
            return Err(invalid());
        }

        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if info_hash.is_none() => {
                    if let Some(prefix) = value.get(..BTIH_PREFIX.len())
                        && prefix.eq_ignore_ascii_case(BTIH_PREFIX)
                    {
                        info_hash = Some(InfoHash::parse(&value[BTIH_PREFIX.len()..])?);
                    }
                }
                "dn" if !value.is_empty() => display_name = Some(value.into_owned()),
                "tr" => trackers.push(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            info_hash: info_hash.ok_or_else(invalid)?,
            display_name,
            trackers,
            uri: trimmed.to_string(),
        })
    }

    /// Accepts either a magnet URI or a bare hex/base32 info hash.
    ///
    /// # Errors
    /// - `StreamboxError::InvalidIdentifier` - Neither a magnet URI nor a hash
    pub fn from_identifier(input: &str) -> Result<Self, StreamboxError> {
        if input.trim_start().starts_with("magnet:") {
            return Self::parse(input);
        }
        let info_hash = InfoHash::parse(input)?;
        Ok(Self {
            info_hash,
            display_name: None,
            trackers: Vec::new(),
            uri: Self::build(info_hash, None, &[]),
        })
    }

    /// Builds a magnet URI for a known info hash.
    pub fn build(info_hash: InfoHash, display_name: Option<&str>, trackers: &[String]) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(name) = display_name {
            query.append_pair("dn", name);
        }
        for tracker in trackers {
            query.append_pair("tr", tracker);
        }

        let extra = query.finish();
        if extra.is_empty() {
            format!("magnet:?xt={BTIH_PREFIX}{info_hash}")
        } else {
            format!("magnet:?xt={BTIH_PREFIX}{info_hash}&{extra}")
        }
    }
}
