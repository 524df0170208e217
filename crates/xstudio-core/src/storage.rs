//! Durable session storage.
//!
//! A flat string key-value store, the same shape a browser's local storage
//! has. `FileStore` keeps it in `$XSTUDIO_HOME/state.json`; `MemoryStore` is
//! for tests and throwaway sessions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::preview::{LayoutMode, PreviewZoom};
use crate::transform::XsltVersion;
use crate::tree::XmlViewMode;

const KEY_PREFIX: &str = "xstudio.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Xml,
    Xslt,
    Log,
}

impl Panel {
    pub fn all() -> &'static [Panel] {
        &[Panel::Xml, Panel::Xslt, Panel::Log]
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Panel::Xml => 0,
            Panel::Xslt => 1,
            Panel::Log => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Xml,
    Xslt,
    Html,
    AutoUpdate,
    Layout,
    XsltVersion,
    ConfigVisible,
    LogVisible,
    XmlCollapsed,
    XsltCollapsed,
    DocInfoCollapsed,
    PreviewZoom,
    XmlViewMode,
    PanelHeight(Panel),
}

impl StorageKey {
    /// Full key as stored, e.g. `xstudio.panel_height.log`.
    pub fn name(self) -> String {
        let suffix = match self {
            StorageKey::Xml => "xml",
            StorageKey::Xslt => "xslt",
            StorageKey::Html => "html",
            StorageKey::AutoUpdate => "auto_update",
            StorageKey::Layout => "layout",
            StorageKey::XsltVersion => "xslt_version",
            StorageKey::ConfigVisible => "config_visible",
            StorageKey::LogVisible => "log_visible",
            StorageKey::XmlCollapsed => "xml_collapsed",
            StorageKey::XsltCollapsed => "xslt_collapsed",
            StorageKey::DocInfoCollapsed => "doc_info_collapsed",
            StorageKey::PreviewZoom => "preview_zoom",
            StorageKey::XmlViewMode => "xml_view_mode",
            StorageKey::PanelHeight(Panel::Xml) => "panel_height.xml",
            StorageKey::PanelHeight(Panel::Xslt) => "panel_height.xslt",
            StorageKey::PanelHeight(Panel::Log) => "panel_height.log",
        };
        format!("{KEY_PREFIX}{suffix}")
    }
}

/// String key-value storage.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Writes several entries. Stores that persist should do it in one write.
    fn set_many(&mut self, entries: &[(String, String)]) -> Result<()> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail (quota exceeded, read-only disk).
    pub fn failing() -> Self {
        Self {
            entries: BTreeMap::new(),
            fail_writes: true,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            bail!("storage is read-only");
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON-file backed store.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store, reading existing entries. A missing file is empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read state from {}", path.display()))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse state from {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize state")?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write state to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn set_many(&mut self, entries: &[(String, String)]) -> Result<()> {
        for (key, value) in entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self.flush()
    }
}

/// Everything the session persists.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub xml: String,
    pub xslt: String,
    pub html: String,
    pub auto_update: bool,
    pub layout: LayoutMode,
    pub xslt_version: XsltVersion,
    pub config_visible: bool,
    pub log_visible: bool,
    pub xml_collapsed: bool,
    pub xslt_collapsed: bool,
    pub doc_info_collapsed: bool,
    pub preview_zoom: PreviewZoom,
    pub xml_view_mode: XmlViewMode,
    pub panel_heights: [Option<u32>; 3],
}

impl SessionSnapshot {
    pub fn panel_height(&self, panel: Panel) -> Option<u32> {
        self.panel_heights[panel.index()]
    }

    /// Key/value pairs to write. Unset panel heights are skipped.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = vec![
            (StorageKey::Xml.name(), self.xml.clone()),
            (StorageKey::Xslt.name(), self.xslt.clone()),
            (StorageKey::Html.name(), self.html.clone()),
            (StorageKey::AutoUpdate.name(), self.auto_update.to_string()),
            (StorageKey::Layout.name(), self.layout.as_str().to_string()),
            (
                StorageKey::XsltVersion.name(),
                self.xslt_version.as_str().to_string(),
            ),
            (
                StorageKey::ConfigVisible.name(),
                self.config_visible.to_string(),
            ),
            (StorageKey::LogVisible.name(), self.log_visible.to_string()),
            (StorageKey::XmlCollapsed.name(), self.xml_collapsed.to_string()),
            (
                StorageKey::XsltCollapsed.name(),
                self.xslt_collapsed.to_string(),
            ),
            (
                StorageKey::DocInfoCollapsed.name(),
                self.doc_info_collapsed.to_string(),
            ),
            (StorageKey::PreviewZoom.name(), self.preview_zoom.to_string()),
            (
                StorageKey::XmlViewMode.name(),
                self.xml_view_mode.as_str().to_string(),
            ),
        ];
        for &panel in Panel::all() {
            if let Some(height) = self.panel_height(panel) {
                entries.push((StorageKey::PanelHeight(panel).name(), height.to_string()));
            }
        }
        entries
    }
}

/// Values read back from storage. Missing or unparsable entries are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    pub xml: Option<String>,
    pub xslt: Option<String>,
    pub html: Option<String>,
    pub auto_update: Option<bool>,
    pub layout: Option<LayoutMode>,
    pub xslt_version: Option<XsltVersion>,
    pub config_visible: Option<bool>,
    pub log_visible: Option<bool>,
    pub xml_collapsed: Option<bool>,
    pub xslt_collapsed: Option<bool>,
    pub doc_info_collapsed: Option<bool>,
    pub preview_zoom: Option<PreviewZoom>,
    pub xml_view_mode: Option<XmlViewMode>,
    pub panel_heights: [Option<u32>; 3],
}

impl StoredSession {
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let get = |key: StorageKey| store.get(&key.name());
        let flag = |key: StorageKey| -> Result<Option<bool>> {
            Ok(get(key)?.and_then(|v| v.trim().parse::<bool>().ok()))
        };

        let mut panel_heights = [None; 3];
        for &panel in Panel::all() {
            panel_heights[panel.index()] =
                get(StorageKey::PanelHeight(panel))?.and_then(|v| v.trim().parse::<u32>().ok());
        }

        Ok(Self {
            xml: get(StorageKey::Xml)?,
            xslt: get(StorageKey::Xslt)?,
            html: get(StorageKey::Html)?,
            auto_update: flag(StorageKey::AutoUpdate)?,
            layout: get(StorageKey::Layout)?.and_then(|v| v.parse().ok()),
            xslt_version: get(StorageKey::XsltVersion)?.and_then(|v| v.parse().ok()),
            config_visible: flag(StorageKey::ConfigVisible)?,
            log_visible: flag(StorageKey::LogVisible)?,
            xml_collapsed: flag(StorageKey::XmlCollapsed)?,
            xslt_collapsed: flag(StorageKey::XsltCollapsed)?,
            doc_info_collapsed: flag(StorageKey::DocInfoCollapsed)?,
            preview_zoom: get(StorageKey::PreviewZoom)?.and_then(|v| PreviewZoom::parse(&v)),
            xml_view_mode: get(StorageKey::XmlViewMode)?.and_then(|v| v.parse().ok()),
            panel_heights,
        })
    }

    pub fn panel_height(&self, panel: Panel) -> Option<u32> {
        self.panel_heights[panel.index()]
    }
}
