use super::*;

pub(crate) const DEFAULT_MARKER_ATTRIBUTE: &str = "data-memoryholed";
pub(crate) const DEFAULT_MARKER_VALUE: &str = "true";
pub(crate) const DEFAULT_ORIGINAL_HREF_ATTRIBUTE: &str = "data-original-href";
pub(crate) const DEFAULT_PLACEHOLDER_HREF: &str = "#";
pub(crate) const DEFAULT_RESTORE_PROMPT: &str = "Restore Link?";
pub(crate) const DEFAULT_IMAGE_TAG: &str = "img";

/// Engine knobs. Every field has a default matching the stock behavior;
/// setters consume and return the config so values can be chained.
#[derive(Debug, Clone)]
pub struct HoleConfig {
    marker_attribute: String,
    marker_value: String,
    original_href_attribute: String,
    placeholder_href: String,
    restore_prompt: String,
    link_selector: Selector,
    container_selector: Selector,
    image_tag: String,
    scan_media: bool,
}

impl Default for HoleConfig {
    fn default() -> Self {
        Self {
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            marker_value: DEFAULT_MARKER_VALUE.to_string(),
            original_href_attribute: DEFAULT_ORIGINAL_HREF_ATTRIBUTE.to_string(),
            placeholder_href: DEFAULT_PLACEHOLDER_HREF.to_string(),
            restore_prompt: DEFAULT_RESTORE_PROMPT.to_string(),
            link_selector: Selector::any_tag(&["a"]),
            container_selector: Selector::any_tag(&["li", "article"]),
            image_tag: DEFAULT_IMAGE_TAG.to_string(),
            scan_media: true,
        }
    }
}

impl HoleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marker_attribute(&self) -> &str {
        &self.marker_attribute
    }

    pub fn marker_value(&self) -> &str {
        &self.marker_value
    }

    pub fn original_href_attribute(&self) -> &str {
        &self.original_href_attribute
    }

    pub fn placeholder_href(&self) -> &str {
        &self.placeholder_href
    }

    pub fn restore_prompt(&self) -> &str {
        &self.restore_prompt
    }

    pub fn link_selector(&self) -> &Selector {
        &self.link_selector
    }

    pub fn container_selector(&self) -> &Selector {
        &self.container_selector
    }

    pub fn image_tag(&self) -> &str {
        &self.image_tag
    }

    pub fn scan_media(&self) -> bool {
        self.scan_media
    }

    pub fn with_marker(mut self, attribute: &str, value: &str) -> Self {
        self.marker_attribute = attribute.to_ascii_lowercase();
        self.marker_value = value.to_string();
        self
    }

    pub fn with_original_href_attribute(mut self, attribute: &str) -> Self {
        self.original_href_attribute = attribute.to_ascii_lowercase();
        self
    }

    pub fn with_placeholder_href(mut self, href: &str) -> Self {
        self.placeholder_href = href.to_string();
        self
    }

    pub fn with_restore_prompt(mut self, message: &str) -> Self {
        self.restore_prompt = message.to_string();
        self
    }

    pub fn with_link_selector(mut self, selector: &str) -> Result<Self> {
        self.link_selector = Selector::parse(selector)?;
        Ok(self)
    }

    pub fn with_container_selector(mut self, selector: &str) -> Result<Self> {
        self.container_selector = Selector::parse(selector)?;
        Ok(self)
    }

    pub fn with_image_tag(mut self, tag: &str) -> Self {
        self.image_tag = tag.to_ascii_lowercase();
        self
    }

    pub fn with_scan_media(mut self, enabled: bool) -> Self {
        self.scan_media = enabled;
        self
    }
}
