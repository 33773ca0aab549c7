//! Embedded static resources.
//!
//! # Module Structure
//!
//! - `template` - `__NAME__` placeholder templates with typed vars
//! - `serve` - Live-reload client script
//! - `report` - Report pages (index.html, source.html)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{LIVERELOAD_SCRIPT, LivereloadVars};
//!
//! let tag = LIVERELOAD_SCRIPT.render(&LivereloadVars { ws_port: 35729, source: None });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for livereload.html.
    pub struct LivereloadVars {
        pub ws_port: u16,
        /// Source key of the page, `None` outside a source.
        pub source: Option<String>,
    }

    impl TemplateVars for LivereloadVars {
        fn vars(&self) -> Vec<(&'static str, String)> {
            let source = serde_json::to_string(&self.source).unwrap_or_else(|_| "null".into());
            vec![("WS_PORT", self.ws_port.to_string()), ("SOURCE", source)]
        }
    }

    /// Inline live-reload client (a `<script>` element).
    pub const LIVERELOAD_SCRIPT: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.html"));
}

pub mod report {
    use super::{Template, TemplateVars};

    /// Variables for index.html.
    pub struct IndexVars {
        pub title: String,
        /// Pre-rendered `<li>` rows
        pub rows: String,
    }

    impl TemplateVars for IndexVars {
        fn vars(&self) -> Vec<(&'static str, String)> {
            vec![("TITLE", self.title.clone()), ("ROWS", self.rows.clone())]
        }
    }

    /// Variables for source.html. Values must already be escaped.
    pub struct SourceVars {
        pub key: String,
        pub path: String,
        pub entries: String,
        pub generation: u64,
        pub includes: String,
        pub documents: String,
    }

    impl TemplateVars for SourceVars {
        fn vars(&self) -> Vec<(&'static str, String)> {
            vec![
                ("KEY", self.key.clone()),
                ("PATH", self.path.clone()),
                ("ENTRIES", self.entries.clone()),
                ("GENERATION", self.generation.to_string()),
                ("INCLUDES", self.includes.clone()),
                ("DOCUMENTS", self.documents.clone()),
            ]
        }
    }

    /// Source list page.
    pub const INDEX_HTML: Template<IndexVars> =
        Template::new(include_str!("report/index.html"));

    /// Single source summary page.
    pub const SOURCE_HTML: Template<SourceVars> =
        Template::new(include_str!("report/source.html"));
}
