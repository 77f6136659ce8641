//! Share links of the form `scheme://import/<collection-id>`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_LINK_SCHEME: &str = "recipebox";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImportLinkError {
    #[error("Not a link (missing scheme): {0}")]
    MissingScheme(String),

    #[error("Not an import link: {0}")]
    NotImport(String),

    #[error("Invalid collection id in link: {0}")]
    InvalidId(String),
}

/// A deep link asking this device to import a shared collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportLink {
    pub scheme: String,
    pub collection_id: Uuid,
}

impl ImportLink {
    pub fn new(collection_id: Uuid) -> Self {
        Self {
            scheme: DEFAULT_LINK_SCHEME.to_string(),
            collection_id,
        }
    }

    pub fn parse(link: &str) -> Result<Self, ImportLinkError> {
        let link = link.trim();
        let (scheme, rest) = link
            .split_once("://")
            .filter(|(scheme, _)| !scheme.is_empty())
            .ok_or_else(|| ImportLinkError::MissingScheme(link.to_string()))?;
        let id = rest
            .strip_prefix("import/")
            .ok_or_else(|| ImportLinkError::NotImport(link.to_string()))?
            .trim_end_matches('/');
        let collection_id =
            Uuid::parse_str(id).map_err(|_| ImportLinkError::InvalidId(id.to_string()))?;

        Ok(Self {
            scheme: scheme.to_string(),
            collection_id,
        })
    }
}

impl FromStr for ImportLink {
    type Err = ImportLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImportLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://import/{}", self.scheme, self.collection_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_link() {
        let id = Uuid::new_v4();
        let link = ImportLink::parse(&format!("recipebox://import/{}", id)).unwrap();
        assert_eq!(link.scheme, "recipebox");
        assert_eq!(link.collection_id, id);
    }

    #[test]
    fn test_parse_accepts_other_schemes_and_trailing_slash() {
        let id = Uuid::new_v4();
        let link: ImportLink = format!("myapp://import/{}/", id).parse().unwrap();
        assert_eq!(link.scheme, "myapp");
        assert_eq!(link.collection_id, id);
    }

    #[test]
    fn test_display_round_trips() {
        let link = ImportLink::new(Uuid::new_v4());
        assert_eq!(ImportLink::parse(&link.to_string()).unwrap(), link);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ImportLink::parse("import/abc"),
            Err(ImportLinkError::MissingScheme(_))
        ));
        assert!(matches!(
            ImportLink::parse("recipebox://open/abc"),
            Err(ImportLinkError::NotImport(_))
        ));
        assert_eq!(
            ImportLink::parse("recipebox://import/not-a-uuid"),
            Err(ImportLinkError::InvalidId("not-a-uuid".to_string()))
        );
    }
}
