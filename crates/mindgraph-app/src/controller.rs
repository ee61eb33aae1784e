use crate::config::MindMapConfig;
use crate::demo;
use crate::error::ControllerError;
use crate::export::{ExportDocument, ExportError};
use crate::history::HistoryManager;
use crate::parse;
use crate::share;
use crate::worker::{ParseOutcome, ParseWorker, Ticket};
use crossbeam_channel::Receiver;
use mindgraph_core::{NodeId, ThemeMode, Tree, TreeError, TreeNode, TreeStats, UiSettings};
use mindgraph_events::{Event, EventBus, ReplaceOrigin};
use mindgraph_graph::{
    ForceModel, GraphSnapshot, GraphState, Reconciler, Simulation, TickOutcome, Vec2, Viewport,
    project,
};
use mindgraph_search::{SearchDebouncer, SearchEngine, SearchOptions};
use mindgraph_storage::{SessionPayload, Storage};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Node context menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    Edit,
    Delete,
    ExpandAll,
    CollapseAll,
}

/// An inline label edit in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub id: NodeId,
    pub draft: String,
    /// The edit pinned the node and must release it when it ends.
    pinned_by_edit: bool,
}

/// Everything the controller owns that a view reads.
#[derive(Debug, Default)]
pub struct AppState {
    pub tree: Tree,
    pub input: String,
    pub graph: GraphState,
    pub selection: Option<NodeId>,
    pub editing: Option<EditSession>,
    pub dragging: Option<NodeId>,
    pub settings: UiSettings,
}

fn visible_labels(graph: &GraphState) -> impl Iterator<Item = (NodeId, &str)> {
    graph.nodes().iter().map(|node| (node.id, node.label.as_str()))
}

/// Single owner of the document tree and the graph derived from it.
///
/// Every structural change runs on a copy of the tree first. Only when it
/// succeeds is the previous state pushed to history, the copy swapped in and
/// the graph re-projected and reconciled. Failures leave the tree, graph and
/// history as they were and are published on the event bus.
pub struct MindMapController {
    config: MindMapConfig,
    state: AppState,
    history: HistoryManager,
    reconciler: Reconciler,
    simulation: Simulation,
    viewport: Viewport,
    search: SearchEngine,
    debouncer: SearchDebouncer,
    worker: Option<ParseWorker>,
    storage: Option<Storage>,
    bus: EventBus,
}

impl MindMapController {
    pub fn new(config: MindMapConfig) -> Self {
        let reconciler = Reconciler::new(
            config.visualization.simulation.initial_spread,
            config.visualization.animations.exit_duration(true),
        );
        let simulation = Simulation::new(
            config.visualization.simulation.clone(),
            Self::force_model(&config),
        );
        Self::assemble(config, reconciler, simulation)
    }

    /// Deterministic spawn positions and jiggle.
    pub fn with_seed(config: MindMapConfig, seed: u64) -> Self {
        let reconciler = Reconciler::with_seed(
            config.visualization.simulation.initial_spread,
            config.visualization.animations.exit_duration(true),
            seed,
        );
        let simulation = Simulation::with_seed(
            config.visualization.simulation.clone(),
            Self::force_model(&config),
            seed,
        );
        Self::assemble(config, reconciler, simulation)
    }

    fn force_model(config: &MindMapConfig) -> ForceModel {
        ForceModel::from_config(&config.visualization.forces, &config.visualization.nodes)
    }

    fn assemble(config: MindMapConfig, reconciler: Reconciler, simulation: Simulation) -> Self {
        let viewport = Viewport::new(config.ui.width, config.ui.height, config.ui.zoom.clone());
        let search = SearchEngine::new(config.ui.search.clone());
        let debouncer = SearchDebouncer::new(Duration::from_millis(config.ui.search.debounce_ms));
        let history = HistoryManager::new(config.history.max_size);
        Self {
            config,
            state: AppState::default(),
            history,
            reconciler,
            simulation,
            viewport,
            search,
            debouncer,
            worker: None,
            storage: None,
            bus: EventBus::new(),
        }
    }

    /// Attach persistent storage and pick up stored display settings.
    pub fn with_storage(mut self, storage: Storage) -> Self {
        match storage.load_settings(&self.config.storage.settings_key) {
            Ok(Some(settings)) => self.apply_settings(settings),
            Ok(None) => {}
            Err(err) => warn!("Failed to load stored settings: {err}"),
        }
        self.storage = Some(storage);
        self
    }

    pub fn events(&self) -> Receiver<Event> {
        self.bus.receiver()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &MindMapConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn tree(&self) -> &Tree {
        &self.state.tree
    }

    pub fn input(&self) -> &str {
        &self.state.input
    }

    pub fn graph(&self) -> &GraphState {
        &self.state.graph
    }

    pub fn selection(&self) -> Option<NodeId> {
        self.state.selection
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.state.editing.as_ref()
    }

    pub fn settings(&self) -> &UiSettings {
        &self.state.settings
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn search(&self) -> &SearchEngine {
        &self.search
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn is_settled(&self) -> bool {
        self.simulation.is_settled()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo(&self.state.tree, &self.state.input)
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn stats(&self) -> TreeStats {
        self.state.tree.stats()
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Parse `text` synchronously and replace the tree with it.
    ///
    /// Any request still queued on the background parser is superseded.
    pub fn apply_input(&mut self, text: &str) -> Result<usize, ControllerError> {
        if let Some(worker) = self.worker.as_mut() {
            worker.cancel_pending();
        }
        let parsed = parse::parse_input(text).map_err(|err| self.fail(err.into()))?;
        Ok(self.replace_from_value(&parsed.value, text.to_string()))
    }

    /// Queue `text` on the background parser. Only the newest ticket is ever applied.
    pub fn submit_input(&mut self, text: &str) -> Ticket {
        self.worker.get_or_insert_with(ParseWorker::spawn).submit(text)
    }

    /// Apply the newest finished parse, if any.
    pub fn poll_parse(&mut self) -> Option<Result<usize, ControllerError>> {
        let outcome = self.worker.as_mut()?.try_take_latest()?;
        Some(self.apply_outcome(outcome))
    }

    /// Block up to `timeout` for the newest parse and apply it.
    pub fn wait_parse(&mut self, timeout: Duration) -> Option<Result<usize, ControllerError>> {
        let outcome = self.worker.as_mut()?.wait_latest(timeout)?;
        Some(self.apply_outcome(outcome))
    }

    fn apply_outcome(&mut self, outcome: ParseOutcome) -> Result<usize, ControllerError> {
        match outcome.result {
            Ok(parsed) => Ok(self.replace_from_value(&parsed.value, outcome.text)),
            Err(err) => Err(self.fail(err.into())),
        }
    }

    fn replace_from_value(&mut self, value: &serde_json::Value, input: String) -> usize {
        self.save_history();
        let count = self.state.tree.replace_root(value);
        self.state.input = input;
        self.after_replace(ReplaceOrigin::Input, count);
        count
    }

    /// Replace the tree with an already-built root, validating and re-keying it first.
    fn replace_with_root(
        &mut self,
        root: Option<TreeNode>,
        input: String,
        origin: ReplaceOrigin,
    ) -> Result<usize, ControllerError> {
        let mut next = self.state.tree.clone();
        let count = match root {
            Some(root) => next.adopt(root).map_err(|err| self.fail(err.into()))?,
            None => {
                next.clear();
                0
            }
        };
        self.save_history();
        self.state.tree = next;
        self.state.input = input;
        self.after_replace(origin, count);
        Ok(count)
    }

    fn after_replace(&mut self, origin: ReplaceOrigin, node_count: usize) {
        self.reset_interaction();
        self.refresh();
        self.publish_history_state();
        self.bus.publish(Event::TreeReplaced { origin, node_count });

        let threshold = self.config.performance.large_data_threshold;
        if node_count > threshold {
            warn!("Large document: {node_count} nodes (threshold {threshold})");
            self.bus.publish(Event::ShowWarning {
                message: format!("Large document with {node_count} nodes, layout may be slow"),
            });
        }
    }

    /// Pretty-print the current input text in its own format.
    pub fn format_input(&mut self) -> Result<String, ControllerError> {
        let formatted =
            parse::format_input(&self.state.input).map_err(|err| self.fail(err.into()))?;
        self.state.input = formatted.clone();
        Ok(formatted)
    }

    pub fn load_demo(&mut self) -> Result<usize, ControllerError> {
        self.apply_input(&demo::demo_input())
    }

    // ------------------------------------------------------------------
    // Structural commands
    // ------------------------------------------------------------------

    fn mutate_tree<T>(
        &mut self,
        op: impl FnOnce(&mut Tree) -> Result<T, TreeError>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T, ControllerError> {
        let mut next = self.state.tree.clone();
        let outcome = op(&mut next).map_err(|err| self.fail(err.into()))?;
        if changed(&outcome) {
            self.save_history();
            self.state.tree = next;
            self.refresh();
            self.publish_history_state();
        }
        Ok(outcome)
    }

    /// Select a node (or deselect it when already selected) and toggle its collapse.
    pub fn click(&mut self, id: NodeId) -> Result<(), ControllerError> {
        if !self.state.graph.contains(id) {
            return Err(self.fail(TreeError::NodeNotFound(id).into()));
        }
        let selection = if self.state.selection == Some(id) {
            None
        } else {
            Some(id)
        };
        self.set_selection(selection);
        self.toggle_collapse(id)?;
        Ok(())
    }

    /// Clicking empty canvas clears the selection and commits an open edit.
    pub fn click_background(&mut self) {
        if self.state.editing.is_some()
            && let Err(err) = self.commit_edit()
        {
            debug!("Edit not committed: {err}");
        }
        self.set_selection(None);
    }

    pub fn toggle_collapse(&mut self, id: NodeId) -> Result<bool, ControllerError> {
        let collapsed = self
            .state
            .tree
            .find(id)
            .map(TreeNode::is_collapsed)
            .unwrap_or(false);
        self.set_collapsed(id, !collapsed)
    }

    /// Returns `Ok(false)` for leaves and for nodes already in the requested state.
    pub fn set_collapsed(&mut self, id: NodeId, collapsed: bool) -> Result<bool, ControllerError> {
        let changed = self.mutate_tree(|tree| tree.set_collapsed(id, collapsed), |c| *c)?;
        if changed {
            self.bus.publish(Event::NodeCollapsed { id, collapsed });
        }
        Ok(changed)
    }

    pub fn expand_all(&mut self) -> Result<usize, ControllerError> {
        let changed = self.mutate_tree(|tree| Ok(tree.expand_all()), |c| *c > 0)?;
        self.bus.publish(Event::AllExpanded { changed });
        Ok(changed)
    }

    pub fn collapse_all(&mut self) -> Result<usize, ControllerError> {
        let changed = self.mutate_tree(|tree| Ok(tree.collapse_all()), |c| *c > 0)?;
        self.bus.publish(Event::AllCollapsed { changed });
        Ok(changed)
    }

    /// Delete a node and its subtree. Returns the number of nodes removed.
    pub fn delete_node(&mut self, id: NodeId) -> Result<usize, ControllerError> {
        let removed = self.mutate_tree(
            |tree| tree.delete(id).map(|node| node.descendant_count() + 1),
            |_| true,
        )?;
        info!("Deleted {id} ({removed} nodes)");
        self.bus.publish(Event::NodeDeleted { id, removed });
        Ok(removed)
    }

    pub fn delete_selected(&mut self) -> Result<usize, ControllerError> {
        match self.state.selection {
            Some(id) => self.delete_node(id),
            None => Ok(0),
        }
    }

    pub fn context_action(
        &mut self,
        id: NodeId,
        action: ContextAction,
    ) -> Result<(), ControllerError> {
        match action {
            ContextAction::Edit => self.begin_edit(id),
            ContextAction::Delete => self.delete_node(id).map(|_| ()),
            ContextAction::ExpandAll => self.expand_all().map(|_| ()),
            ContextAction::CollapseAll => self.collapse_all().map(|_| ()),
        }
    }

    // ------------------------------------------------------------------
    // Inline editing
    // ------------------------------------------------------------------

    /// Open an inline edit seeded with the node's label. The node is held in place
    /// until the edit ends.
    pub fn begin_edit(&mut self, id: NodeId) -> Result<(), ControllerError> {
        let Some(label) = self.state.tree.find(id).map(|node| node.label().to_string()) else {
            return Err(self.fail(TreeError::NodeNotFound(id).into()));
        };
        if self.state.editing.is_some()
            && let Err(err) = self.commit_edit()
        {
            debug!("Previous edit not committed: {err}");
        }

        let pinned_by_edit = match self.state.graph.node(id) {
            Some(node) if !node.is_pinned() => {
                let position = node.position;
                self.state.graph.pin(id, position)
            }
            _ => false,
        };
        self.state.editing = Some(EditSession {
            id,
            draft: label,
            pinned_by_edit,
        });
        self.bus.publish(Event::EditStarted { id });
        Ok(())
    }

    pub fn update_edit(&mut self, draft: &str) -> bool {
        match self.state.editing.as_mut() {
            Some(edit) => {
                edit.draft = draft.to_string();
                true
            }
            None => false,
        }
    }

    /// Apply the draft label. A blank draft is rejected and the label kept.
    pub fn commit_edit(&mut self) -> Result<bool, ControllerError> {
        let Some(edit) = self.state.editing.take() else {
            return Ok(false);
        };
        self.release_edit_pin(&edit);

        let result = self.mutate_tree(|tree| tree.rename(edit.id, &edit.draft), |c| *c);
        let committed = matches!(result, Ok(true));
        self.bus.publish(Event::EditFinished {
            id: edit.id,
            committed,
        });
        if committed {
            self.bus.publish(Event::NodeRenamed {
                id: edit.id,
                label: edit.draft.trim().to_string(),
            });
        }
        result
    }

    pub fn cancel_edit(&mut self) -> bool {
        let Some(edit) = self.state.editing.take() else {
            return false;
        };
        self.release_edit_pin(&edit);
        self.bus.publish(Event::EditFinished {
            id: edit.id,
            committed: false,
        });
        true
    }

    fn release_edit_pin(&mut self, edit: &EditSession) {
        if edit.pinned_by_edit && self.state.dragging != Some(edit.id) {
            self.state.graph.unpin(edit.id);
        }
    }

    // ------------------------------------------------------------------
    // Dragging
    // ------------------------------------------------------------------

    /// Pin a node under the pointer (world coordinates) and reheat the layout.
    pub fn drag_start(&mut self, id: NodeId, pointer: Vec2) -> Result<(), ControllerError> {
        if !self.state.graph.pin(id, pointer) {
            return Err(self.fail(TreeError::NodeNotFound(id).into()));
        }
        if let Some(previous) = self.state.dragging.replace(id)
            && previous != id
        {
            self.release_drag_pin(previous);
        }
        self.simulation.begin_drag();
        Ok(())
    }

    pub fn drag_move(&mut self, pointer: Vec2) -> bool {
        match self.state.dragging {
            Some(id) => self.state.graph.pin(id, pointer),
            None => false,
        }
    }

    /// Release the dragged node. A node being edited stays pinned until the edit ends.
    pub fn drag_end(&mut self) -> bool {
        let Some(id) = self.state.dragging.take() else {
            return false;
        };
        self.release_drag_pin(id);
        self.simulation.end_drag();
        true
    }

    fn release_drag_pin(&mut self, id: NodeId) {
        match self.state.editing.as_mut() {
            Some(edit) if edit.id == id => edit.pinned_by_edit = true,
            _ => {
                self.state.graph.unpin(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub fn undo(&mut self) -> Result<(), ControllerError> {
        let Some(entry) = self
            .history
            .undo(&self.state.tree, &self.state.input)
            .cloned()
        else {
            return Err(self.fail(ControllerError::NothingToRestore("undo")));
        };
        self.restore_entry(&entry.tree, entry.input);
        self.bus.publish(Event::Undone);
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), ControllerError> {
        let Some(entry) = self.history.redo().cloned() else {
            return Err(self.fail(ControllerError::NothingToRestore("redo")));
        };
        self.restore_entry(&entry.tree, entry.input);
        self.bus.publish(Event::Redone);
        Ok(())
    }

    fn restore_entry(&mut self, tree: &Tree, input: String) {
        self.cancel_edit();
        self.state.tree.restore(tree);
        self.state.input = input;
        self.refresh();
        self.publish_history_state();
    }

    fn save_history(&mut self) {
        self.history.save(&self.state.tree, &self.state.input);
    }

    fn publish_history_state(&self) {
        self.bus.publish(Event::UndoStackChanged {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        });
    }

    // ------------------------------------------------------------------
    // Layout
    // ------------------------------------------------------------------

    /// Advance exit transitions and run one simulation tick.
    pub fn tick(&mut self, elapsed: Duration) -> TickOutcome {
        self.state.graph.advance_transitions(elapsed);
        let was_running = !self.simulation.is_settled();
        let outcome = self
            .simulation
            .step(&mut self.state.graph, self.viewport.center());
        if was_running && outcome == TickOutcome::Settled {
            self.bus.publish(Event::LayoutSettled {
                ticks: self.simulation.ticks(),
            });
        }
        outcome
    }

    /// Run the layout to rest and finish all exit transitions. Returns ticks taken.
    pub fn settle(&mut self, max_ticks: u64) -> u64 {
        self.state.graph.advance_transitions(Duration::MAX);
        let was_running = !self.simulation.is_settled();
        let taken =
            self.simulation
                .run_until_settled(&mut self.state.graph, self.viewport.center(), max_ticks);
        if was_running && self.simulation.is_settled() {
            self.bus.publish(Event::LayoutSettled {
                ticks: self.simulation.ticks(),
            });
        }
        taken
    }

    /// Resize the canvas. The layout re-centres on the new midpoint.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport.resize(width, height);
        self.simulation.restart();
    }

    /// Fit the view around the visible graph.
    pub fn center_view(&mut self) {
        match self.state.graph.bounds() {
            Some(bounds) => self.viewport.center_on(bounds),
            None => self.viewport.reset(),
        }
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Debounced entry point for typed queries. An empty query clears immediately.
    pub fn search_input(&mut self, query: &str, now: Instant) {
        if query.trim().is_empty() {
            self.debouncer.cancel();
            self.clear_search();
        } else {
            self.debouncer.schedule(query, now);
        }
    }

    /// Run a debounced query whose delay has elapsed.
    pub fn poll_search(&mut self, now: Instant) -> Option<usize> {
        let query = self.debouncer.poll(now)?;
        Some(self.search_now(&query))
    }

    /// Search visible labels and focus the first hit.
    pub fn search_now(&mut self, query: &str) -> usize {
        self.debouncer.cancel();
        let count = self.search.search(query, visible_labels(&self.state.graph));
        self.bus.publish(Event::SearchComplete {
            query: query.trim().to_string(),
            result_count: count,
        });
        if let Some(id) = self.search.current() {
            self.focus_node(id);
        }
        count
    }

    pub fn set_search_options(&mut self, options: SearchOptions) {
        self.search.set_options(options);
        if self.search.is_active() {
            self.search.rerun(visible_labels(&self.state.graph));
        }
    }

    pub fn search_next(&mut self) -> Option<NodeId> {
        let id = self.search.next()?;
        self.focus_node(id);
        Some(id)
    }

    pub fn search_prev(&mut self) -> Option<NodeId> {
        let id = self.search.prev()?;
        self.focus_node(id);
        Some(id)
    }

    pub fn clear_search(&mut self) {
        if self.search.is_active() {
            self.search.clear();
            self.bus.publish(Event::SearchCleared);
        }
    }

    fn focus_node(&mut self, id: NodeId) {
        let Some(position) = self.state.graph.node(id).map(|node| node.position) else {
            return;
        };
        self.viewport.focus(position);
        self.bus.publish(Event::SearchFocus {
            id,
            index: self.search.cursor().unwrap_or(0),
            total: self.search.results().len(),
        });
    }

    // ------------------------------------------------------------------
    // Export and sharing
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        GraphSnapshot::new(&self.state.graph, self.state.tree.root())
    }

    pub fn export_document(&self) -> Result<ExportDocument, ControllerError> {
        ExportDocument::build(self.state.tree.root(), &self.state.graph, &self.state.input)
            .map_err(|err| self.fail(err.into()))
    }

    pub fn export_json(&self) -> Result<String, ControllerError> {
        self.export_document()?
            .to_json()
            .map_err(|err| self.fail(err.into()))
    }

    pub fn export_to(&self, path: &Path) -> Result<(), ControllerError> {
        self.export_document()?
            .write_to(path)
            .map_err(|err| self.fail(err.into()))
    }

    pub fn share_token(&self) -> Result<String, ControllerError> {
        let root = self
            .state
            .tree
            .root()
            .ok_or_else(|| self.fail(ExportError::NothingToExport.into()))?;
        share::encode_tree(root).map_err(|err| self.fail(err.into()))
    }

    pub fn share_url(&self, base: &str) -> Result<String, ControllerError> {
        Ok(share::share_url(base, &self.share_token()?))
    }

    /// Replace the tree with a shared one. The input text becomes the shared
    /// document rendered as JSON.
    pub fn load_share(&mut self, token: &str) -> Result<usize, ControllerError> {
        let decoded = share::decode_tree(token).map_err(|err| self.fail(err.into()))?;
        let root = decoded.root().cloned();
        let input = root
            .as_ref()
            .and_then(|root| serde_json::to_string_pretty(&root.to_document()).ok())
            .unwrap_or_default();
        let count = self.replace_with_root(root, input, ReplaceOrigin::Share)?;
        self.bus.publish(Event::ShowSuccess {
            message: "Shared map loaded".to_string(),
        });
        Ok(count)
    }

    pub fn load_share_url(&mut self, url: &str) -> Result<usize, ControllerError> {
        let token = share::token_from_url(url)
            .map_err(|err| self.fail(err.into()))?
            .to_string();
        self.load_share(&token)
    }

    // ------------------------------------------------------------------
    // Sessions and settings
    // ------------------------------------------------------------------

    fn storage(&self) -> Result<&Storage, ControllerError> {
        self.storage
            .as_ref()
            .ok_or_else(|| self.fail(ControllerError::NoStorage))
    }

    pub fn save_session(&self) -> Result<(), ControllerError> {
        let storage = self.storage()?;
        let key = &self.config.storage.session_key;
        let payload = SessionPayload::new(
            self.state.input.as_str(),
            self.state.tree.root(),
            self.state.settings.clone(),
        );
        storage
            .save_session(key, &payload)
            .map_err(|err| self.fail(err.into()))?;
        info!("Saved session {key:?}");
        self.bus.publish(Event::SessionSaved { key: key.clone() });
        self.bus.publish(Event::ShowSuccess {
            message: "Session saved".to_string(),
        });
        Ok(())
    }

    /// Restore the stored session. Returns `Ok(false)` when nothing was stored.
    pub fn load_session(&mut self) -> Result<bool, ControllerError> {
        let key = self.config.storage.session_key.clone();
        let payload = self
            .storage()?
            .load_session(&key)
            .map_err(|err| self.fail(err.into()))?;
        let Some(payload) = payload else {
            self.bus.publish(Event::ShowInfo {
                message: "No saved session".to_string(),
            });
            return Ok(false);
        };

        self.replace_with_root(payload.tree, payload.input, ReplaceOrigin::Session)?;
        self.apply_settings(payload.settings);
        info!("Loaded session {key:?}");
        self.bus.publish(Event::SessionLoaded { key });
        Ok(true)
    }

    pub fn clear_session(&mut self) -> Result<bool, ControllerError> {
        let key = self.config.storage.session_key.clone();
        let removed = self
            .storage()?
            .clear_session(&key)
            .map_err(|err| self.fail(err.into()))?;
        if removed {
            self.bus.publish(Event::SessionCleared { key });
        }
        Ok(removed)
    }

    /// Apply display settings and persist them when storage is attached.
    pub fn update_settings(&mut self, settings: UiSettings) -> Result<(), ControllerError> {
        self.apply_settings(settings);
        if let Some(storage) = self.storage.as_ref() {
            storage
                .save_settings(&self.config.storage.settings_key, &self.state.settings)
                .map_err(|err| self.fail(err.into()))?;
        }
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<ThemeMode, ControllerError> {
        let mut settings = self.state.settings.clone();
        settings.theme = settings.theme.toggled();
        let theme = settings.theme;
        self.update_settings(settings)?;
        Ok(theme)
    }

    fn apply_settings(&mut self, settings: UiSettings) {
        self.reconciler.set_exit_duration(
            self.config
                .visualization
                .animations
                .exit_duration(settings.animations),
        );
        self.state.settings = settings;
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn set_selection(&mut self, selection: Option<NodeId>) {
        if self.state.selection != selection {
            self.state.selection = selection;
            self.bus.publish(Event::SelectionChanged { id: selection });
        }
    }

    fn reset_interaction(&mut self) {
        self.cancel_edit();
        if self.state.dragging.take().is_some() {
            self.simulation.end_drag();
        }
        self.set_selection(None);
    }

    /// Re-project the tree, reconcile it against the live graph and reheat the layout.
    fn refresh(&mut self) {
        let projection = project(self.state.tree.root());
        let previous = std::mem::take(&mut self.state.graph);
        let result = self
            .reconciler
            .reconcile(previous, projection, self.viewport.center());
        let (entered, exited) = (result.entered.len(), result.exited.len());
        self.state.graph = result.state;
        self.simulation.restart();

        if let Some(id) = self.state.selection
            && !self.state.graph.contains(id)
        {
            self.set_selection(None);
        }
        if let Some(id) = self.state.editing.as_ref().map(|edit| edit.id)
            && !self.state.graph.contains(id)
        {
            self.cancel_edit();
        }
        if let Some(id) = self.state.dragging
            && !self.state.graph.contains(id)
        {
            self.state.dragging = None;
            self.simulation.end_drag();
        }
        if self.search.is_active() {
            let count = self.search.rerun(visible_labels(&self.state.graph));
            debug!("Search re-run after refresh: {count} hits");
        }

        self.bus.publish(Event::GraphUpdated {
            nodes: self.state.graph.node_count(),
            links: self.state.graph.link_count(),
            entered,
            exited,
        });
    }

    /// Publish the failure event for `err`, log it and hand it back.
    fn fail(&self, err: ControllerError) -> ControllerError {
        let message = err.to_string();
        let event = match &err {
            ControllerError::Parse(_) => Event::ParseFailed { error: message },
            ControllerError::Structural(_) => Event::StructuralRejected { reason: message },
            ControllerError::Storage(_) | ControllerError::NoStorage => {
                Event::StorageFailed { error: message }
            }
            ControllerError::Export(_) => Event::ExportFailed { error: message },
            ControllerError::Share(_) => Event::ShowError { message },
            ControllerError::NothingToRestore(_) => Event::ShowInfo { message },
        };
        match &err {
            ControllerError::NothingToRestore(_) => debug!("{err}"),
            _ => warn!("{err}"),
        }
        self.bus.publish(event);
        err
    }
}
