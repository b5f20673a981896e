use serde::{Deserialize, Serialize};

/// Contents of `book_structure.yaml`: the ordered selection of source files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookStructure {
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRef>,
}

/// A file entry is either a bare path or a `{ path, title }` mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileRef {
    Path(String),
    Titled {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl FileRef {
    pub fn path(&self) -> &str {
        match self {
            FileRef::Path(path) => path,
            FileRef::Titled { path, .. } => path,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            FileRef::Path(_) => None,
            FileRef::Titled { title, .. } => title.as_deref(),
        }
    }
}

impl BookStructure {
    pub fn file_count(&self) -> usize {
        self.sections.iter().map(|s| s.files.len()).sum()
    }
}
