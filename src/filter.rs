use crate::proxy::ProxyNode;

/// Keyword rules applied to a site's nodes.
///
/// Keywords are matched case-insensitively as substrings of the node's display
/// name and host. Exclusion is evaluated first and always wins.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    inclusion: Vec<String>,
    exclusion: Vec<String>,
}

impl KeywordFilter {
    pub fn new(inclusion: &[String], exclusion: &[String]) -> Self {
        Self {
            inclusion: lowercase_all(inclusion),
            exclusion: lowercase_all(exclusion),
        }
    }

    /// Returns `true` when no rule is configured at all.
    pub fn is_empty(&self) -> bool {
        self.inclusion.is_empty() && self.exclusion.is_empty()
    }

    /// Decides whether a node survives both stages.
    pub fn accepts(&self, node: &ProxyNode) -> bool {
        let text = haystack(node);
        if !self.exclusion.is_empty() && matches_any(&text, &self.exclusion) {
            return false;
        }
        self.inclusion.is_empty() || matches_any(&text, &self.inclusion)
    }

    /// Keeps the accepted nodes, preserving their order.
    pub fn apply(&self, nodes: Vec<ProxyNode>) -> Vec<ProxyNode> {
        if self.is_empty() {
            return nodes;
        }
        nodes.into_iter().filter(|node| self.accepts(node)).collect()
    }
}

fn haystack(node: &ProxyNode) -> String {
    format!(
        "{} {}",
        node.name().to_lowercase(),
        node.server().to_lowercase()
    )
}

fn matches_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|keyword| text.contains(keyword.as_str()))
}

fn lowercase_all(keywords: &[String]) -> Vec<String> {
    keywords.iter().map(|k| k.to_lowercase()).collect()
}
