use crossbeam_channel::{Receiver, Sender, unbounded};
use mindgraph_core::NodeId;
use serde::{Deserialize, Serialize};

/// Where a full tree replacement came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReplaceOrigin {
    Input,
    Session,
    Share,
}

/// Status events emitted by the core. Notification, toast and status-bar adapters
/// subscribe to these; nothing in the core waits on a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Tree
    TreeReplaced {
        origin: ReplaceOrigin,
        node_count: usize,
    },
    NodeRenamed {
        id: NodeId,
        label: String,
    },
    NodeDeleted {
        id: NodeId,
        removed: usize,
    },
    NodeCollapsed {
        id: NodeId,
        collapsed: bool,
    },
    AllExpanded {
        changed: usize,
    },
    AllCollapsed {
        changed: usize,
    },

    // Graph
    GraphUpdated {
        nodes: usize,
        links: usize,
        entered: usize,
        exited: usize,
    },
    LayoutSettled {
        ticks: u64,
    },

    // Interaction
    SelectionChanged {
        id: Option<NodeId>,
    },
    EditStarted {
        id: NodeId,
    },
    EditFinished {
        id: NodeId,
        committed: bool,
    },

    // History
    Undone,
    Redone,
    UndoStackChanged {
        can_undo: bool,
        can_redo: bool,
    },

    // Search
    SearchComplete {
        query: String,
        result_count: usize,
    },
    SearchFocus {
        id: NodeId,
        index: usize,
        total: usize,
    },
    SearchCleared,

    // Persistence
    SessionSaved {
        key: String,
    },
    SessionLoaded {
        key: String,
    },
    SessionCleared {
        key: String,
    },

    // Failures
    ParseFailed {
        error: String,
    },
    StructuralRejected {
        reason: String,
    },
    StorageFailed {
        error: String,
    },
    ExportFailed {
        error: String,
    },

    // Notifications
    ShowInfo {
        message: String,
    },
    ShowSuccess {
        message: String,
    },
    ShowWarning {
        message: String,
    },
    ShowError {
        message: String,
    },
}

impl Event {
    /// True for the discrete failure events of the error taxonomy.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::ParseFailed { .. }
                | Event::StructuralRejected { .. }
                | Event::StorageFailed { .. }
                | Event::ExportFailed { .. }
                | Event::ShowError { .. }
        )
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        tracing::trace!(?event, "publish");
        let _ = self.tx.send(event);
    }

    /// Drain everything queued so far.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Dispatch all pending events to a listener.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }
}

/// Trait for components that respond to events.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}
