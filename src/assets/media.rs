//! Media references in rendered markup.
//!
//! Items reference images as `<img src="...">` and sounds as
//! `<sound src="...">`. Export collects those paths for staging and
//! rewrites them to where the staged copies will live on the device.

use std::collections::HashSet;

use regex::{Captures, Regex};

use crate::error::{Error, Result};

/// Kind of media tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Sound,
}

impl MediaKind {
    /// Markup tag name.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Image => "img",
            Self::Sound => "sound",
        }
    }
}

/// Compiled tag patterns for both media kinds.
#[derive(Debug, Clone)]
pub struct MediaTags {
    img: Regex,
    sound: Regex,
}

impl MediaTags {
    /// Compile the tag patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            img: tag_pattern(MediaKind::Image)?,
            sound: tag_pattern(MediaKind::Sound)?,
        })
    }

    fn pattern(&self, kind: MediaKind) -> &Regex {
        match kind {
            MediaKind::Image => &self.img,
            MediaKind::Sound => &self.sound,
        }
    }

    /// Replace the `src` value of every `kind` tag with `map(src)`.
    ///
    /// `map` sees the sources in order of appearance. Everything outside the
    /// `src` attribute is preserved.
    pub fn rewrite<F>(&self, kind: MediaKind, text: &str, mut map: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        self.pattern(kind)
            .replace_all(text, |caps: &Captures<'_>| {
                format!("{}src=\"{}\"{}", &caps["before"], map(&caps["path"]), &caps["after"])
            })
            .into_owned()
    }
}

fn tag_pattern(kind: MediaKind) -> Result<Regex> {
    let pattern = format!(
        r#"(?is)(?P<before><{}\s+[^>]*?)src\s*=\s*"(?P<path>[^"]*)"(?P<after>[^>]*>)"#,
        kind.tag()
    );
    Regex::new(&pattern).map_err(|e| Error::Other(format!("media pattern: {e}")))
}

/// Media sources referenced during one export, deduplicated by staged name.
///
/// The first source claiming a staged name wins; later sources mapping to
/// the same name are dropped.
#[derive(Debug, Default, Clone)]
pub struct MediaRefs {
    sources: Vec<String>,
    names: HashSet<String>,
}

impl MediaRefs {
    /// Record `source` staged as `name`. Returns whether it was new.
    pub fn add(&mut self, source: &str, name: &str) -> bool {
        if !self.names.insert(name.to_string()) {
            return false;
        }
        self.sources.push(source.to_string());
        true
    }

    /// Sources in first-seen order.
    #[must_use]
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
