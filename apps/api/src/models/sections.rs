use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a section within one document.
///
/// Resumes occasionally repeat a heading (two "Projects" sections, say), so the
/// name alone is not a key: `ordinal` counts earlier sections with the same
/// name, starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectionKey {
    pub name: String,
    pub ordinal: usize,
}

impl SectionKey {
    pub fn new(name: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }

    /// Key of the first section with this name.
    pub fn first(name: impl Into<String>) -> Self {
        Self::new(name, 0)
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ordinal == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} (#{})", self.name, self.ordinal + 1)
        }
    }
}

/// One named region of a document. `content` is verbatim source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(flatten)]
    pub key: SectionKey,
    pub content: String,
}

/// Ordered `key → content` mapping for one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SectionMap {
    sections: Vec<Section>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a section, assigning the next ordinal for its name.
    pub fn push(&mut self, name: impl Into<String>, content: impl Into<String>) -> SectionKey {
        let name = name.into();
        let ordinal = self.sections.iter().filter(|s| s.key.name == name).count();
        let key = SectionKey::new(name, ordinal);
        self.sections.push(Section {
            key: key.clone(),
            content: content.into(),
        });
        key
    }

    pub fn get(&self, key: &SectionKey) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| &s.key == key)
            .map(|s| s.content.as_str())
    }

    /// Content of the first section called `name`.
    pub fn get_by_name(&self, name: &str) -> Option<&str> {
        self.get(&SectionKey::first(name))
    }

    /// Overwrites the content of an existing section. Returns false (and
    /// changes nothing) if the key is absent; the key set never grows here.
    pub fn replace_content(&mut self, key: &SectionKey, content: impl Into<String>) -> bool {
        match self.sections.iter_mut().find(|s| &s.key == key) {
            Some(section) => {
                section.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SectionKey> {
        self.sections.iter().map(|s| &s.key)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<'a> IntoIterator for &'a SectionMap {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
