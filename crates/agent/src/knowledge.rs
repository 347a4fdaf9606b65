use std::path::Path;

use tracing::warn;

use leadflow_core::normalize::normalize;

const FALLBACK_CONTENT: &str = "Base de conhecimento não disponível.";

/// Markdown-sectioned knowledge file feeding the generation context.
/// Keyword routing picks one `## ` section; anything unrecognized gets the
/// whole document.
#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    content: String,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::from_content(FALLBACK_CONTENT)
    }
}

impl KnowledgeBase {
    pub fn from_content(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }

    /// A missing or unreadable file degrades to a placeholder, never an
    /// error: generation falls back to scripted replies anyway.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_content(content),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "knowledge base unavailable");
                Self::default()
            }
        }
    }

    pub fn search_context(&self, query: &str) -> String {
        let key = normalize(query);

        let routes: &[(&[&str], &str)] = &[
            (&["seminario", "direitos humanos", "evento"], "## SEMINARIOS"),
            (&["pos", "graduacao", "especializacao", "trilha"], "## POS-GRADUACOES"),
            (&["empresa", "instituicao", "quem somos", "contato"], "## INSTITUCIONAL"),
        ];

        for (keywords, header) in routes {
            if keywords.iter().any(|keyword| key.contains(keyword)) {
                if let Some(section) = self.extract_section(header) {
                    return section;
                }
            }
        }

        self.content.clone()
    }

    /// Case- and accent-insensitive `## ` header match; the section runs to
    /// the next `## ` header or end of file.
    fn extract_section(&self, header: &str) -> Option<String> {
        let wanted = normalize(header);
        let mut collected: Vec<&str> = Vec::new();
        let mut in_section = false;

        for line in self.content.lines() {
            if line.starts_with("## ") {
                if in_section {
                    break;
                }
                in_section = normalize(line) == wanted;
            }
            if in_section {
                collected.push(line);
            }
        }

        (!collected.is_empty()).then(|| collected.join("\n"))
    }
}
