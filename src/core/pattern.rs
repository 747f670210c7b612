use std::fmt;
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PatternError {
    #[error("seed prefix is not an absolute http(s) url: {0:?}")]
    BadPrefix(String),

    #[error("seed suffix must look like `_<n>.jpg`, got {0:?}")]
    BadSuffix(String),
}

/// Trailing `_<n>.jpg` token of a photo url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixToken {
    /// `width` is the digit count as written in the seed, so `_01.jpg`
    /// renders back as `_01.jpg`. Zero means no padding.
    Numbered { n: u32, width: usize },
    /// Looked like a suffix but carried no number we could parse.
    Opaque(String),
}

impl SuffixToken {
    /// An empty token means the seed had no suffix at all; treat it as `_0.jpg`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Ok(Self::Numbered { n: 0, width: 0 });
        }
        let inner = raw
            .strip_prefix('_')
            .and_then(|s| s.strip_suffix(".jpg"))
            .ok_or_else(|| PatternError::BadSuffix(raw.to_string()))?;

        match inner.parse::<u32>() {
            Ok(n) if inner.bytes().all(|b| b.is_ascii_digit()) => Ok(Self::Numbered { n, width: inner.len() }),
            _ => Ok(Self::Opaque(raw.to_string())),
        }
    }

    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Numbered { n, .. } => Some(*n),
            Self::Opaque(_) => None,
        }
    }

    /// `_1.jpg` -> `_2.jpg`. Padding from the seed is dropped on the first
    /// bump, `_01.jpg` -> `_2.jpg`. An opaque token cannot be bumped; it is
    /// logged and handed back unchanged so the caller's next probe simply misses.
    pub fn incremented(&self) -> Self {
        match self {
            Self::Numbered { n, .. } => Self::Numbered { n: n.saturating_add(1), width: 0 },
            Self::Opaque(raw) => {
                tracing::warn!(suffix = %raw, "can't increment image suffix, keeping it as is");
                self.clone()
            }
        }
    }
}

impl fmt::Display for SuffixToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered { n, width } => write!(f, "_{:0width$}.jpg", n, width = *width),
            Self::Opaque(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrlPattern {
    prefix: String,
    pub middle_index: u32,
    pub suffix: SuffixToken,
}

impl ImageUrlPattern {
    pub fn from_seed(prefix: &str, suffix: &str) -> Result<Self, PatternError> {
        let ok = Url::parse(prefix)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !ok {
            return Err(PatternError::BadPrefix(prefix.to_string()));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            middle_index: 0,
            suffix: SuffixToken::parse(suffix)?,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn render(&self) -> String {
        if self.middle_index == 0 {
            format!("{}{}", self.prefix, self.suffix)
        } else {
            format!("{}_{}{}", self.prefix, self.middle_index, self.suffix)
        }
    }
}
