//! Document state management.
//!
//! Three levels, each with its own [`PropertyStore`]:
//! - [`GlobalState`] owns every open document, keyed by document id.
//! - [`DocumentState`] owns the line index and the ordered sections of one
//!   document, with one [`SectionState`] per section.
//! - [`SectionState`] binds a section to the handler of its grammar.
//!
//! A `DocumentState` keeps its identity across edits; its content is swapped
//! under a lock. Section states whose section survives an edit are reused
//! together with their property stores.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::cancel::CancellationRegistry;
use crate::error::{Error, LockResultExt, Result};
use crate::grammar::{GrammarHandler, GrammarRegistry, SectionChange};
use crate::properties::PropertyStore;
use crate::reference::{panic_message, ResolutionContext};

use super::location::{Interval, Location, Position};
use super::section::{Section, SectionSegmenter};
use super::text::LineIndex;

type Notifications = Vec<(Arc<SectionState>, SectionChange)>;

/// State for one grammar section of a document.
pub struct SectionState {
    document_id: String,
    document: Weak<DocumentState>,
    section: RwLock<Section>,
    handler: Option<Arc<dyn GrammarHandler>>,
    properties: PropertyStore,
    detached: AtomicBool,
}

impl fmt::Debug for SectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SectionState")
            .field("document_id", &self.document_id)
            .field("section", &self.section())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl SectionState {
    fn new(
        document_id: &str,
        document: Weak<DocumentState>,
        section: Section,
        grammars: &GrammarRegistry,
    ) -> Arc<Self> {
        let handler = grammars.handler(&section.grammar_name);
        if handler.is_none() {
            log::debug!(
                target: "seclsp::state",
                "no handler for grammar '{}' in {}",
                section.grammar_name,
                document_id
            );
        }
        Arc::new(Self {
            document_id: document_id.to_string(),
            document,
            section: RwLock::new(section),
            handler,
            properties: PropertyStore::new(),
            detached: AtomicBool::new(false),
        })
    }

    /// The section this state currently stands for.
    pub fn section(&self) -> Section {
        self.section
            .read()
            .recover_poison("SectionState::section")
            .clone()
    }

    pub fn grammar_name(&self) -> String {
        self.section
            .read()
            .recover_poison("SectionState::grammar_name")
            .grammar_name
            .clone()
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// The owning document, unless this section was dropped from it.
    pub fn document(&self) -> Option<Arc<DocumentState>> {
        if self.detached.load(Ordering::Acquire) {
            return None;
        }
        self.document.upgrade()
    }

    pub fn handler(&self) -> Option<&Arc<dyn GrammarHandler>> {
        self.handler.as_ref()
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Text of the section's lines.
    pub fn text(&self) -> Result<String> {
        self.with_index(|index, section| {
            Ok(index
                .lines(section.start_line, section.end_line)?
                .to_string())
        })
    }

    /// Interval covering the section.
    pub fn interval(&self) -> Result<Interval> {
        self.with_index(|index, section| Ok(section.interval(index)))
    }

    /// Location of the section within its document.
    pub fn location(&self) -> Result<Location> {
        Ok(Location::new(self.document_id.clone(), self.interval()?))
    }

    /// Location of an interval inside this section's document.
    pub fn location_of(&self, interval: Interval) -> Location {
        Location::new(self.document_id.clone(), interval)
    }

    /// Revision of the owning document.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.owning_document()?.revision())
    }

    /// The document's line index together with the section, read under the
    /// document lock so both belong to the same revision.
    pub fn with_index<T>(&self, f: impl FnOnce(&LineIndex, &Section) -> Result<T>) -> Result<T> {
        let document = self.owning_document()?;
        let content = document.content();
        let section = self.section.read().recover_poison("SectionState::with_index");
        f(&content.line_index, &section)
    }

    fn owning_document(&self) -> Result<Arc<DocumentState>> {
        self.document()
            .ok_or_else(|| Error::unknown_document(self.document_id.clone()))
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

struct DocumentContent {
    line_index: Arc<LineIndex>,
    sections: Vec<Arc<SectionState>>,
    revision: u64,
}

/// State for a single open document.
pub struct DocumentState {
    id: String,
    content: RwLock<DocumentContent>,
    properties: PropertyStore,
}

impl fmt::Debug for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = self.content();
        f.debug_struct("DocumentState")
            .field("id", &self.id)
            .field("revision", &content.revision)
            .field("sections", &content.sections.len())
            .finish()
    }
}

impl DocumentState {
    /// Index and segment `text`, creating one section state per section.
    fn new(
        id: &str,
        text: String,
        revision: u64,
        grammars: &GrammarRegistry,
        segmenter: &SectionSegmenter,
    ) -> Arc<Self> {
        let line_index = LineIndex::new(text);
        let sections = segmenter.segment(&line_index);

        Arc::new_cyclic(|weak: &Weak<DocumentState>| {
            let sections = sections
                .into_iter()
                .map(|section| SectionState::new(id, weak.clone(), section, grammars))
                .collect();
            Self {
                id: id.to_string(),
                content: RwLock::new(DocumentContent {
                    line_index: Arc::new(line_index),
                    sections,
                    revision,
                }),
                properties: PropertyStore::new(),
            }
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Incremented on every text change.
    pub fn revision(&self) -> u64 {
        self.content().revision
    }

    pub fn line_index(&self) -> Arc<LineIndex> {
        Arc::clone(&self.content().line_index)
    }

    pub fn text(&self) -> String {
        self.content().line_index.text().to_string()
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Section states in document order.
    pub fn sections(&self) -> Vec<Arc<SectionState>> {
        self.content().sections.clone()
    }

    pub fn section_count(&self) -> usize {
        self.content().sections.len()
    }

    /// Visit every section in document order.
    pub fn for_each_section(&self, mut consumer: impl FnMut(&Arc<SectionState>)) {
        for section in self.sections() {
            consumer(&section);
        }
    }

    /// The section containing `line`, found by binary search.
    ///
    /// The empty line after a terminal line break belongs to the last
    /// section. Lines past the end of the document have no section.
    pub fn section_at_line(&self, line: u32) -> Option<Arc<SectionState>> {
        let content = self.content();
        if line >= content.line_index.line_count() {
            return None;
        }
        let sections = &content.sections;
        let found = sections.binary_search_by(|state| {
            let section = state.section();
            if section.contains_line(line) {
                std::cmp::Ordering::Equal
            } else if section.end_line < line {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });
        match found {
            Ok(i) => Some(Arc::clone(&sections[i])),
            Err(i) if i == sections.len() => sections.last().cloned(),
            Err(_) => None,
        }
    }

    pub fn section_at(&self, position: Position) -> Option<Arc<SectionState>> {
        self.section_at_line(position.line)
    }

    fn content(&self) -> RwLockReadGuard<'_, DocumentContent> {
        self.content
            .read()
            .recover_poison("DocumentState::content")
    }

    /// Replace the text, re-segment and reconcile section states.
    ///
    /// A previous section state is reused when its grammar, start line and
    /// declaration flag match a new section; each is reused at most once.
    /// Returns the handler notifications to dispatch once the lock is gone.
    fn update(
        self: &Arc<Self>,
        text: String,
        grammars: &GrammarRegistry,
        segmenter: &SectionSegmenter,
    ) -> Notifications {
        let line_index = LineIndex::new(text);
        let new_sections = segmenter.segment(&line_index);

        let mut content = self
            .content
            .write()
            .recover_poison("DocumentState::update");
        let old_index = Arc::clone(&content.line_index);
        let mut previous = std::mem::take(&mut content.sections).into_iter().peekable();

        let mut notifications = Vec::new();
        let mut states = Vec::with_capacity(new_sections.len());
        let mut reused = 0usize;

        for section in new_sections {
            // Both lists are ordered by start line; skip states that can no
            // longer match.
            while let Some(old) = previous.peek() {
                if old.section().start_line >= section.start_line {
                    break;
                }
                if let Some(old) = previous.next() {
                    notifications.push((old, SectionChange::Removed));
                }
            }

            let candidate = previous
                .peek()
                .filter(|old| old.section().same_identity(&section))
                .is_some();

            match candidate.then(|| previous.next()).flatten() {
                Some(state) => {
                    let old_section = state.section();
                    let changed = old_section != section
                        || section_text(&old_index, &old_section)
                            != section_text(&line_index, &section);
                    if changed {
                        *state
                            .section
                            .write()
                            .recover_poison("DocumentState::update") = section;
                        notifications.push((Arc::clone(&state), SectionChange::Updated));
                    }
                    reused += 1;
                    states.push(state);
                }
                None => {
                    let state =
                        SectionState::new(&self.id, Arc::downgrade(self), section, grammars);
                    notifications.push((Arc::clone(&state), SectionChange::Created));
                    states.push(state);
                }
            }
        }
        notifications.extend(previous.map(|old| (old, SectionChange::Removed)));

        for (state, change) in &notifications {
            if *change == SectionChange::Removed {
                state.detach();
            }
        }

        content.line_index = Arc::new(line_index);
        content.sections = states;
        content.revision += 1;
        self.properties.clear();

        log::debug!(
            target: "seclsp::state",
            "{} revision {}: {} sections, {} reused",
            self.id,
            content.revision,
            content.sections.len(),
            reused
        );
        notifications
    }

    /// Detach every section, returning removal notifications.
    fn release(&self) -> Notifications {
        self.sections()
            .into_iter()
            .map(|state| {
                state.detach();
                (state, SectionChange::Removed)
            })
            .collect()
    }
}

fn section_text<'a>(index: &'a LineIndex, section: &Section) -> Option<&'a str> {
    index.lines(section.start_line, section.end_line).ok()
}

/// Created notifications for every section of a fresh document.
fn created(document: &DocumentState) -> Notifications {
    document
        .sections()
        .into_iter()
        .map(|state| (state, SectionChange::Created))
        .collect()
}

/// Process-level state: every open document plus shared services.
pub struct GlobalState {
    documents: DashMap<String, Arc<DocumentState>>,
    /// Last revision of each closed document id.
    closed_revisions: DashMap<String, u64>,
    grammars: GrammarRegistry,
    segmenter: SectionSegmenter,
    cancellations: CancellationRegistry,
    resolution_context: RwLock<Option<Arc<dyn ResolutionContext>>>,
    properties: PropertyStore,
}

impl fmt::Debug for GlobalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalState")
            .field("documents", &self.documents.len())
            .field("grammars", &self.grammars)
            .field("default_grammar", &self.segmenter.default_grammar())
            .finish()
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new(GrammarRegistry::new(), SectionSegmenter::default())
    }
}

impl GlobalState {
    pub fn new(grammars: GrammarRegistry, segmenter: SectionSegmenter) -> Self {
        Self {
            documents: DashMap::new(),
            closed_revisions: DashMap::new(),
            grammars,
            segmenter,
            cancellations: CancellationRegistry::new(),
            resolution_context: RwLock::new(None),
            properties: PropertyStore::new(),
        }
    }

    pub fn grammars(&self) -> &GrammarRegistry {
        &self.grammars
    }

    pub fn segmenter(&self) -> &SectionSegmenter {
        &self.segmenter
    }

    pub fn cancellations(&self) -> &CancellationRegistry {
        &self.cancellations
    }

    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Open a document, replacing any state already held under `id`.
    ///
    /// Revisions continue from the last one held under `id`, so content
    /// opened again never reuses a revision of earlier content.
    pub fn open(&self, id: &str, text: String) -> Arc<DocumentState> {
        let (document, replaced) = match self.documents.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                let revision = entry.get().revision() + 1;
                let document =
                    DocumentState::new(id, text, revision, &self.grammars, &self.segmenter);
                let old = entry.insert(Arc::clone(&document));
                (document, Some(old))
            }
            Entry::Vacant(entry) => {
                let revision = self
                    .closed_revisions
                    .remove(id)
                    .map(|(_, last)| last + 1)
                    .unwrap_or(0);
                let document =
                    DocumentState::new(id, text, revision, &self.grammars, &self.segmenter);
                entry.insert(Arc::clone(&document));
                (document, None)
            }
        };

        let mut notifications = replaced.map(|old| old.release()).unwrap_or_default();
        notifications.extend(created(&document));
        log::debug!(
            target: "seclsp::state",
            "opened {} with {} sections",
            id,
            document.section_count()
        );
        dispatch(notifications);
        document
    }

    /// Replace the text of an open document.
    pub fn change(&self, id: &str, text: String) -> Result<Arc<DocumentState>> {
        let document = self.document(id).ok_or_else(|| Error::unknown_document(id))?;
        let notifications = document.update(text, &self.grammars, &self.segmenter);
        dispatch(notifications);
        Ok(document)
    }

    /// Close a document and release its sections.
    pub fn close(&self, id: &str) -> Result<()> {
        let (_, document) = self
            .documents
            .remove(id)
            .ok_or_else(|| Error::unknown_document(id))?;
        self.closed_revisions
            .insert(id.to_string(), document.revision());
        dispatch(document.release());
        log::debug!(target: "seclsp::state", "closed {}", id);
        Ok(())
    }

    pub fn document(&self, id: &str) -> Option<Arc<DocumentState>> {
        self.documents.get(id).map(|r| Arc::clone(&r))
    }

    /// Like [`GlobalState::document`] but failing with `UnknownDocument`.
    pub fn require_document(&self, id: &str) -> Result<Arc<DocumentState>> {
        self.document(id).ok_or_else(|| Error::unknown_document(id))
    }

    /// Ids of all open documents, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Visit every open document in id order.
    pub fn for_each_document(&self, mut consumer: impl FnMut(&Arc<DocumentState>)) {
        for id in self.document_ids() {
            if let Some(document) = self.document(&id) {
                consumer(&document);
            }
        }
    }

    /// Install (or clear) the semantic model used to resolve references.
    pub fn set_resolution_context(&self, context: Option<Arc<dyn ResolutionContext>>) {
        *self
            .resolution_context
            .write()
            .recover_poison("GlobalState::set_resolution_context") = context;
    }

    pub fn resolution_context(&self) -> Option<Arc<dyn ResolutionContext>> {
        self.resolution_context
            .read()
            .recover_poison("GlobalState::resolution_context")
            .clone()
    }
}

/// Deliver change notifications to handlers, isolating panics.
fn dispatch(notifications: Notifications) {
    for (state, change) in notifications {
        let Some(handler) = state.handler() else {
            continue;
        };
        let result = catch_unwind(AssertUnwindSafe(|| {
            handler.on_section_changed(&state, change)
        }));
        if let Err(payload) = result {
            log::error!(
                target: "seclsp::state",
                "handler '{}' panicked on {:?} notification for {}: {}",
                handler.name(),
                change,
                state.document_id(),
                panic_message(payload.as_ref())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records notifications as "grammar:start-end:change".
    struct Recorder {
        name: &'static str,
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                events: Mutex::new(Vec::new()),
            })
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl GrammarHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn on_section_changed(&self, section: &SectionState, change: SectionChange) {
            let s = section.section();
            self.events.lock().unwrap().push(format!(
                "{}:{}-{}:{:?}",
                s.grammar_name, s.start_line, s.end_line, change
            ));
        }
    }

    struct Panicker;

    impl GrammarHandler for Panicker {
        fn name(&self) -> &str {
            "Broken"
        }

        fn on_section_changed(&self, _section: &SectionState, _change: SectionChange) {
            panic!("handler failure");
        }
    }

    const TEXT: &str = "Class a\n###Mapping\nMapping b\n(\n)\n";

    fn global(recorders: &[Arc<Recorder>]) -> GlobalState {
        let mut grammars = GrammarRegistry::new();
        for r in recorders {
            grammars.register(Arc::clone(r) as Arc<dyn GrammarHandler>);
        }
        GlobalState::new(grammars, SectionSegmenter::default())
    }

    #[test]
    fn open_segments_document() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        let sections: Vec<Section> = doc.sections().iter().map(|s| s.section()).collect();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].grammar_name, "Pure");
        assert_eq!((sections[0].start_line, sections[0].end_line), (0, 0));
        assert!(!sections[0].has_explicit_declaration());
        assert_eq!(sections[1].grammar_name, "Mapping");
        assert_eq!((sections[1].start_line, sections[1].end_line), (1, 4));
        assert!(sections[1].has_explicit_declaration());
        assert_eq!(doc.revision(), 0);
    }

    #[test]
    fn change_before_open_is_unknown_document() {
        let state = GlobalState::default();
        let err = state.change("doc1", TEXT.to_string()).unwrap_err();
        assert!(matches!(err, Error::UnknownDocument { ref id } if id == "doc1"));
        assert!(state.close("doc1").is_err());
    }

    #[test]
    fn appending_a_line_reuses_every_section() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        let before = doc.sections();
        for (i, s) in before.iter().enumerate() {
            s.properties().set("parsed", Some(i));
        }

        let changed = state
            .change("doc1", format!("{}Mapping c\n", TEXT))
            .unwrap();
        assert!(Arc::ptr_eq(&doc, &changed));
        let after = changed.sections();
        assert_eq!(after.len(), before.len());
        for (i, (old, new)) in before.iter().zip(&after).enumerate() {
            assert!(Arc::ptr_eq(old, new));
            assert_eq!(*new.properties().get::<usize>("parsed").unwrap().unwrap(), i);
        }
        assert_eq!(after[1].section().end_line, 5);
        assert_eq!(changed.revision(), 1);
    }

    #[test]
    fn moved_section_gets_fresh_state() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        doc.sections()[1].properties().set("parsed", Some(true));

        state
            .change("doc1", format!("Class z\n{}", TEXT))
            .unwrap();
        let mapping = &doc.sections()[1];
        assert_eq!(mapping.section().start_line, 2);
        assert!(mapping.properties().is_empty());
    }

    #[test]
    fn notifications_describe_reconciliation() {
        let pure = Recorder::new("Pure");
        let mapping = Recorder::new("Mapping");
        let state = global(&[Arc::clone(&pure), Arc::clone(&mapping)]);

        state.open("doc1", TEXT.to_string());
        assert_eq!(pure.take(), vec!["Pure:0-0:Created"]);
        assert_eq!(mapping.take(), vec!["Mapping:1-4:Created"]);

        // Editing only the mapping section leaves the Pure section untouched.
        state
            .change("doc1", "Class a\n###Mapping\nMapping b\n(x)\n".to_string())
            .unwrap();
        assert!(pure.take().is_empty());
        assert_eq!(mapping.take(), vec!["Mapping:1-3:Updated"]);

        state
            .change("doc1", "###Mapping\nMapping b\n".to_string())
            .unwrap();
        assert_eq!(pure.take(), vec!["Pure:0-0:Removed"]);
        assert_eq!(
            mapping.take(),
            vec!["Mapping:0-1:Created", "Mapping:1-3:Removed"]
        );

        state.close("doc1").unwrap();
        assert_eq!(mapping.take(), vec!["Mapping:0-1:Removed"]);
        assert!(state.document("doc1").is_none());
    }

    #[test]
    fn identical_text_notifies_nothing() {
        let mapping = Recorder::new("Mapping");
        let state = global(&[Arc::clone(&mapping)]);
        state.open("doc1", TEXT.to_string());
        mapping.take();
        state.change("doc1", TEXT.to_string()).unwrap();
        assert!(mapping.take().is_empty());
    }

    #[test]
    fn panicking_handler_does_not_abort_dispatch() {
        let mapping = Recorder::new("Mapping");
        let mut grammars = GrammarRegistry::new();
        grammars.register(Arc::new(Panicker));
        grammars.register(Arc::clone(&mapping) as Arc<dyn GrammarHandler>);
        let state = GlobalState::new(grammars, SectionSegmenter::default());

        state.open("doc1", "###Broken\nx\n###Mapping\ny".to_string());
        assert_eq!(mapping.take(), vec!["Mapping:2-3:Created"]);
        assert_eq!(state.document("doc1").unwrap().section_count(), 2);
    }

    #[test]
    fn section_at_line_uses_document_order() {
        let state = GlobalState::default();
        let doc = state.open("doc1", "a\n###X\nb\n###Y\nc\n".to_string());
        let grammar_at = |line| doc.section_at_line(line).map(|s| s.grammar_name());
        assert_eq!(grammar_at(0).as_deref(), Some("Pure"));
        assert_eq!(grammar_at(2).as_deref(), Some("X"));
        assert_eq!(grammar_at(4).as_deref(), Some("Y"));
        // The empty line after the final line break.
        assert_eq!(grammar_at(5).as_deref(), Some("Y"));
        assert!(grammar_at(6).is_none());

        let mut seen = Vec::new();
        doc.for_each_section(|s| seen.push(s.section().start_line));
        assert_eq!(seen, vec![0, 1, 3]);
    }

    #[test]
    fn section_text_and_location() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        let mapping = doc.section_at_line(2).unwrap();
        assert_eq!(mapping.text().unwrap(), "###Mapping\nMapping b\n(\n)\n");
        assert_eq!(mapping.location().unwrap().to_string(), "doc1@1:0-4:0");
    }

    #[test]
    fn removed_section_is_detached() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        let mapping = doc.section_at_line(1).unwrap();
        state.change("doc1", "Class a\n".to_string()).unwrap();
        assert!(mapping.document().is_none());
        assert!(matches!(
            mapping.text(),
            Err(Error::UnknownDocument { .. })
        ));
    }

    #[test]
    fn document_properties_reset_on_change() {
        let state = GlobalState::default();
        let doc = state.open("doc1", TEXT.to_string());
        doc.properties().set("model", Some(1u8));
        state.change("doc1", TEXT.to_string()).unwrap();
        assert!(doc.properties().is_empty());
    }

    #[test]
    fn reopen_replaces_document() {
        let state = GlobalState::default();
        let first = state.open("doc1", TEXT.to_string());
        let second = state.open("doc1", "Class b".to_string());
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(state.document_ids(), vec!["doc1".to_string()]);
        assert_eq!(state.document("doc1").unwrap().text(), "Class b");
        assert_eq!(second.revision(), 1);
    }

    #[test]
    fn revisions_continue_after_close() {
        let state = GlobalState::default();
        state.open("doc1", TEXT.to_string());
        state.change("doc1", "Class b".to_string()).unwrap();
        state.close("doc1").unwrap();

        let reopened = state.open("doc1", TEXT.to_string());
        assert_eq!(reopened.revision(), 2);
        state.change("doc1", "Class c".to_string()).unwrap();
        assert_eq!(reopened.revision(), 3);

        assert_eq!(state.open("doc2", TEXT.to_string()).revision(), 0);
    }

    #[test]
    fn documents_are_edited_concurrently() {
        let state = Arc::new(GlobalState::default());
        for i in 0..8 {
            state.open(&format!("doc{}", i), TEXT.to_string());
        }
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    let id = format!("doc{}", i);
                    for n in 0..20 {
                        let text = format!("{}{}\n", TEXT, "x".repeat(n));
                        state.change(&id, text).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        state.for_each_document(|doc| assert_eq!(doc.revision(), 20));
    }
}
