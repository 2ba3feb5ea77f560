//! Rendering of item text for devices.
//!
//! Question and answer text pass through two stages before export:
//! 1. macro expansion, literal substitution of each configured macro name
//!    by its expansion (macros applied in name order);
//! 2. named text hooks registered by the embedding application.
//!
//! Staged media files can also be post-processed by named file hooks.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::host::HostStore;
use crate::model::StudyItem;

/// Hook applied to the question text.
pub const HOOK_QUESTION: &str = "gogo_q";
/// Hook applied to the answer text.
pub const HOOK_ANSWER: &str = "gogo_a";
/// Hook run on each staged image.
pub const HOOK_IMAGE: &str = "gogo_img";
/// Hook run on each staged sound.
pub const HOOK_SOUND: &str = "gogo_snd";

/// Which side of an item to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Question,
    Answer,
}

impl Side {
    #[must_use]
    pub const fn hook(self) -> &'static str {
        match self {
            Self::Question => HOOK_QUESTION,
            Self::Answer => HOOK_ANSWER,
        }
    }
}

type TextHook = Box<dyn Fn(&str, &StudyItem) -> String>;
type FileHook = Box<dyn Fn(&Path)>;

/// Macro expander plus named hook chains.
#[derive(Default)]
pub struct Renderer {
    macros: Vec<(String, String)>,
    text_hooks: HashMap<String, Vec<TextHook>>,
    file_hooks: HashMap<String, Vec<FileHook>>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("macros", &self.macros.len())
            .field("text_hooks", &self.text_hooks.keys().collect::<Vec<_>>())
            .field("file_hooks", &self.file_hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Renderer {
    #[must_use]
    pub fn new(macros: Vec<(String, String)>) -> Self {
        Self {
            macros,
            ..Self::default()
        }
    }

    /// Renderer using the host's macro table.
    ///
    /// # Errors
    ///
    /// Returns an error if the macros cannot be read.
    pub fn from_store<S: HostStore + ?Sized>(store: &S) -> Result<Self> {
        Ok(Self::new(store.macros()?))
    }

    /// Append a hook to the chain named `name`.
    pub fn add_text_hook(&mut self, name: &str, hook: impl Fn(&str, &StudyItem) -> String + 'static) {
        self.text_hooks
            .entry(name.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    /// Append a file hook to the chain named `name`.
    pub fn add_file_hook(&mut self, name: &str, hook: impl Fn(&Path) + 'static) {
        self.file_hooks
            .entry(name.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    /// Expand every macro in `text`.
    #[must_use]
    pub fn expand_macros(&self, text: &str) -> String {
        self.macros
            .iter()
            .filter(|(name, _)| !name.is_empty())
            .fold(text.to_string(), |acc, (name, expansion)| acc.replace(name.as_str(), expansion))
    }

    /// Render one side of `item`: macros, then the side's hook chain.
    #[must_use]
    pub fn render(&self, item: &StudyItem, side: Side) -> String {
        let raw = match side {
            Side::Question => &item.question,
            Side::Answer => &item.answer,
        };
        let expanded = self.expand_macros(raw);
        match self.text_hooks.get(side.hook()) {
            Some(chain) => chain.iter().fold(expanded, |text, hook| hook(&text, item)),
            None => expanded,
        }
    }

    /// Run the file hooks named `name` on `path`.
    pub fn run_file_hooks(&self, name: &str, path: &Path) {
        if let Some(chain) = self.file_hooks.get(name) {
            for hook in chain {
                hook(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LearningState;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn card(q: &str, a: &str) -> StudyItem {
        StudyItem {
            key: 1,
            id: "c".to_string(),
            category: "greek".to_string(),
            question: q.to_string(),
            answer: a.to_string(),
            state: LearningState::default(),
        }
    }

    #[test]
    fn test_macros_expand_literally() {
        let renderer = Renderer::new(vec![
            ("\\alpha".to_string(), "&alpha;".to_string()),
            ("\\beta".to_string(), "&beta;".to_string()),
        ]);
        assert_eq!(
            renderer.render(&card("\\alpha + \\beta", "x"), Side::Question),
            "&alpha; + &beta;"
        );
    }

    #[test]
    fn test_hooks_chain_in_order_per_side() {
        let mut renderer = Renderer::default();
        renderer.add_text_hook(HOOK_QUESTION, |t, _| format!("[{t}]"));
        renderer.add_text_hook(HOOK_QUESTION, |t, item| format!("{t}@{}", item.category));
        renderer.add_text_hook(HOOK_ANSWER, |t, _| t.to_uppercase());

        let item = card("q", "a");
        assert_eq!(renderer.render(&item, Side::Question), "[q]@greek");
        assert_eq!(renderer.render(&item, Side::Answer), "A");
    }

    #[test]
    fn test_file_hooks() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut renderer = Renderer::default();
        let sink = Rc::clone(&seen);
        renderer.add_file_hook(HOOK_IMAGE, move |p| sink.borrow_mut().push(p.to_path_buf()));

        renderer.run_file_hooks(HOOK_IMAGE, Path::new("IMG/a.png"));
        renderer.run_file_hooks(HOOK_SOUND, Path::new("SND/a.wav"));
        assert_eq!(*seen.borrow(), vec![Path::new("IMG/a.png").to_path_buf()]);
    }
}
