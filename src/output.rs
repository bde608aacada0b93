//! Output path templates.
//!
//! An [`OutputPattern`] is a printf-style template with exactly one integer
//! conversion, which receives a frame's sequence index:
//!
//! | Template           | Index 7          |
//! |--------------------|------------------|
//! | `frame_%d.png`     | `frame_7.png`    |
//! | `frame_%03d.png`   | `frame_007.png`  |
//! | `frame_%4d.png`    | `frame_   7.png` |
//! | `frame_%-3d.png`   | `frame_7  .png`  |
//! | `100%%_%d.png`     | `100%_7.png`     |
//!
//! `%i` and `%u` are accepted as synonyms for `%d`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Largest field width accepted in a placeholder.
pub const MAX_PLACEHOLDER_WIDTH: usize = 64;

/// Why a template was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PatternError {
    /// The template has no integer conversion.
    #[error("output pattern {0:?} has no integer placeholder (e.g. %d or %03d)")]
    MissingPlaceholder(String),

    /// The template has more than one conversion.
    #[error("output pattern {0:?} has more than one placeholder")]
    MultiplePlaceholders(String),

    /// A conversion other than `%d`, `%i`, `%u` or `%%`.
    #[error("output pattern {pattern:?} has unsupported conversion %{conversion}")]
    UnsupportedConversion {
        /// The offending template.
        pattern: String,
        /// The conversion character found.
        conversion: char,
    },

    /// The field width is larger than [`MAX_PLACEHOLDER_WIDTH`].
    #[error("output pattern {pattern:?} has a field width above 64")]
    WidthTooLarge {
        /// The offending template.
        pattern: String,
    },

    /// The template ends in the middle of a conversion.
    #[error("output pattern {0:?} ends with an incomplete placeholder")]
    Incomplete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placeholder {
    zero_pad: bool,
    left_align: bool,
    width: usize,
}

impl Placeholder {
    fn render(&self, index: u64, out: &mut String) {
        let width = self.width;
        let rendered = if self.left_align {
            format!("{index:<width$}")
        } else if self.zero_pad {
            format!("{index:0width$}")
        } else {
            format!("{index:>width$}")
        };
        out.push_str(&rendered);
    }
}

/// A validated output path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    source: String,
    prefix: String,
    placeholder: Placeholder,
    suffix: String,
}

impl OutputPattern {
    /// Parse and validate a template.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] unless the template contains exactly one
    /// integer conversion.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut placeholder = None;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let literal = if placeholder.is_some() {
                &mut suffix
            } else {
                &mut prefix
            };

            if c != '%' {
                literal.push(c);
                continue;
            }

            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }

            let mut current = Placeholder {
                zero_pad: false,
                left_align: false,
                width: 0,
            };

            while let Some(&flag) = chars.peek() {
                match flag {
                    '0' => current.zero_pad = true,
                    '-' => current.left_align = true,
                    _ => break,
                }
                chars.next();
            }

            while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
                current.width = current.width.saturating_mul(10).saturating_add(digit as usize);
                chars.next();
            }

            if current.width > MAX_PLACEHOLDER_WIDTH {
                return Err(PatternError::WidthTooLarge {
                    pattern: pattern.to_string(),
                });
            }

            match chars.next() {
                Some('d' | 'i' | 'u') => {}
                Some(conversion) => {
                    return Err(PatternError::UnsupportedConversion {
                        pattern: pattern.to_string(),
                        conversion,
                    });
                }
                None => return Err(PatternError::Incomplete(pattern.to_string())),
            }

            if placeholder.is_some() {
                return Err(PatternError::MultiplePlaceholders(pattern.to_string()));
            }
            placeholder = Some(current);
        }

        let placeholder =
            placeholder.ok_or_else(|| PatternError::MissingPlaceholder(pattern.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            prefix,
            placeholder,
            suffix,
        })
    }

    /// Render the output path for frame `index`.
    pub fn format(&self, index: u64) -> PathBuf {
        let mut out = String::with_capacity(self.source.len() + 8);
        out.push_str(&self.prefix);
        self.placeholder.render(index, &mut out);
        out.push_str(&self.suffix);
        PathBuf::from(out)
    }

    /// The template as given to [`parse`](OutputPattern::parse).
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for OutputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for OutputPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
