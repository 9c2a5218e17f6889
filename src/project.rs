use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::components::history::{HistoryEntry, HistoryLog};
use crate::components::tools::{EditMode, RegionEditor};
use crate::io::{ImageAsset, inline_dimensions};

/// Single design session: the current image, its region editor and the
/// generation history.
#[derive(Debug)]
pub struct DesignSession {
    pub id: Uuid,
    /// Display name ("Untitled-X" until renamed).
    pub name: String,
    pub created: DateTime<Utc>,
    pub history: HistoryLog,
    pub editor: RegionEditor,
    current_image: Option<ImageAsset>,
}

impl DesignSession {
    pub fn new_untitled(untitled_counter: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: format!("Untitled-{}", untitled_counter),
            created: Utc::now(),
            history: HistoryLog::new(),
            editor: RegionEditor::default(),
            current_image: None,
        }
    }

    pub fn current_image(&self) -> Option<&ImageAsset> {
        self.current_image.as_ref()
    }

    /// Shows a different image. The editor is rebound to `dimensions` when
    /// given, or to the decoded size of an inline image; a hosted image with
    /// no known size leaves it unbound. Either way all regions and the mask
    /// are discarded.
    pub fn set_current_image(&mut self, image: ImageAsset, dimensions: Option<(u32, u32)>) {
        let (w, h) = match dimensions {
            Some(size) => size,
            None if image.is_inline() => inline_dimensions(&image).unwrap_or_else(|e| {
                log_warn!("Could not read size of {}: {}", image.summary(), e);
                (0, 0)
            }),
            None => (0, 0),
        };
        self.current_image = Some(image);
        self.editor.reset_for_image(w, h);
    }

    /// Binds the editor once the displayed image's pixel size is known.
    pub fn bind_dimensions(&mut self, width: u32, height: u32) {
        if self.editor.dimensions() != (width, height) {
            self.editor.reset_for_image(width, height);
        }
    }

    /// Records a finished generation: new current image, one history entry,
    /// editor back to an empty view.
    pub fn record_generation(&mut self, prompt: &str, output: String) -> HistoryEntry {
        let entry = HistoryEntry::new(prompt, output.clone());
        self.history.push(entry.clone());
        self.set_current_image(ImageAsset::Hosted(output), None);
        entry
    }

    /// Goes back to an earlier version from the history panel.
    pub fn restore(&mut self, entry: &HistoryEntry) {
        self.set_current_image(ImageAsset::from_reference(entry.output.clone()), None);
        self.editor.set_mode(EditMode::View);
    }

    /// Placeholder text for the prompt box in the current state.
    pub fn prompt_hint(&self) -> &'static str {
        if self.current_image.is_none() {
            return "Describe the image you want to generate...";
        }
        match self.editor.mode() {
            EditMode::Draw => {
                "Describe what to add or change in the selected areas (e.g., 'Add a modern leather sofa')"
            }
            EditMode::View => "Describe how to modify the entire room (e.g., 'Change the style to industrial')",
        }
    }
}

/// Free generations left before the user has to sign in. Checked by the
/// caller before submitting an edit; the orchestrator never looks at it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationQuota {
    remaining: u32,
}

impl GenerationQuota {
    pub fn new(remaining: u32) -> Self {
        Self { remaining }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Spends one generation after a successful submission.
    pub fn consume(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Region;

    #[test]
    fn test_switching_image_resets_editor() {
        let mut session = DesignSession::new_untitled(1);
        assert_eq!(session.name, "Untitled-1");
        session.set_current_image(ImageAsset::Hosted("https://img/a.png".into()), Some((64, 64)));
        session.editor.add_region(Region::new(0.0, 0.0, 10.0, 10.0));
        assert!(!session.editor.mask().is_empty());

        session.set_current_image(ImageAsset::Hosted("https://img/b.png".into()), Some((32, 32)));
        assert!(session.editor.model().is_empty());
        assert!(session.editor.mask().is_empty());
        assert_eq!(session.editor.dimensions(), (32, 32));
    }

    #[test]
    fn test_record_and_restore() {
        let mut session = DesignSession::new_untitled(2);
        let first = session.record_generation("empty loft", "https://img/1.png".into());
        session.record_generation("add plants", "https://img/2.png".into());
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.current_image().and_then(|i| i.hosted_url()), Some("https://img/2.png"));
        assert!(!session.editor.is_bound());

        session.restore(&first);
        assert_eq!(session.current_image().and_then(|i| i.hosted_url()), Some("https://img/1.png"));
        assert_eq!(session.history.len(), 2);
    }

    #[test]
    fn test_bind_dimensions_after_generation() {
        let mut session = DesignSession::new_untitled(4);
        session.record_generation("loft", "https://img/1.png".into());
        assert!(!session.editor.is_bound());

        session.bind_dimensions(48, 32);
        assert_eq!(session.editor.dimensions(), (48, 32));
        session.editor.add_region(Region::new(0.0, 0.0, 4.0, 4.0));
        // Same size again keeps the drawn regions
        session.bind_dimensions(48, 32);
        assert_eq!(session.editor.model().len(), 1);
    }

    #[test]
    fn test_inline_image_binds_from_its_own_size() {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image::RgbaImage::new(12, 7))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        let mut session = DesignSession::new_untitled(5);
        session.set_current_image(ImageAsset::Inline(crate::io::encode_data_uri("image/png", &bytes)), None);
        assert_eq!(session.editor.dimensions(), (12, 7));

        // Undecodable payloads leave the editor unbound
        session.set_current_image(ImageAsset::Inline("data:image/png;base64,AAAA".into()), None);
        assert!(!session.editor.is_bound());
    }

    #[test]
    fn test_prompt_hint_follows_mode() {
        let mut session = DesignSession::new_untitled(3);
        assert!(session.prompt_hint().starts_with("Describe the image"));
        session.set_current_image(ImageAsset::Hosted("https://img/a.png".into()), Some((10, 10)));
        assert!(session.prompt_hint().contains("entire room"));
        session.editor.set_mode(EditMode::Draw);
        assert!(session.prompt_hint().contains("selected areas"));
    }

    #[test]
    fn test_quota() {
        let mut quota = GenerationQuota::new(1);
        assert!(!quota.is_exhausted());
        quota.consume();
        quota.consume();
        assert!(quota.is_exhausted());
        assert_eq!(quota.remaining(), 0);
    }
}
