//! Selection controller
//!
//! Owns the currently selected build and the breakdown panels shown for it.
//! Every selection change fetches the three breakdowns of the targeted build,
//! projects them and lays them out, then swaps the published
//! [`SelectionState`] in one step. Each in-flight selection carries a ticket
//! (build id plus generation); results whose ticket is no longer current are
//! dropped, so the last selection wins and panels of two builds never mix.

use crate::accessor::Tooltips;
use crate::breakdown::{project_counts, BreakdownView};
use crate::data::{BuildId, Dimension};
use crate::error::Result;
use crate::layout::LayoutConfig;
use crate::source::DataSource;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How the breakdowns of one selection are requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// All dimensions at once, joined before publishing
    #[default]
    Parallel,
    /// One dimension after the other, abandoned once superseded
    Sequential,
}

/// One breakdown view with its layout metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownPanel {
    pub view: BreakdownView,
    pub cardinality: usize,
    pub item_width: f64,
}

impl BreakdownPanel {
    fn new(view: BreakdownView, layout: &LayoutConfig) -> Self {
        let cardinality = view.cardinality();
        Self {
            item_width: layout.item_width(view.dimension, cardinality),
            cardinality,
            view,
        }
    }
}

/// Published selection: one build and all of its breakdown panels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionState {
    pub build: BuildId,
    pub platform: BreakdownPanel,
    pub priority: BreakdownPanel,
    pub category: BreakdownPanel,
}

impl SelectionState {
    fn assemble(build: BuildId, views: [BreakdownView; 3], layout: &LayoutConfig) -> Self {
        let [platform, priority, category] = views;
        Self {
            build,
            platform: BreakdownPanel::new(platform, layout),
            priority: BreakdownPanel::new(priority, layout),
            category: BreakdownPanel::new(category, layout),
        }
    }

    pub fn panel(&self, dimension: Dimension) -> &BreakdownPanel {
        match dimension {
            Dimension::Platform => &self.platform,
            Dimension::Priority => &self.priority,
            Dimension::Category => &self.category,
        }
    }

    pub fn panels(&self) -> impl Iterator<Item = &BreakdownPanel> {
        [&self.platform, &self.priority, &self.category].into_iter()
    }
}

/// Controller state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Nothing selected yet
    Idle,
    /// A selection is in flight
    Loading { target: BuildId },
    /// A selection is published and nothing is in flight
    Ready { build: BuildId },
}

/// Tag of an in-flight selection
#[derive(Debug, Clone, PartialEq, Eq)]
struct Ticket {
    build: BuildId,
    generation: u64,
}

/// Result of a call to [`SelectionController::select_build`]
#[derive(Debug, Clone)]
pub enum SelectOutcome {
    /// A new state was published
    Published(Arc<SelectionState>),
    /// The build was already selected and settled
    Unchanged(Arc<SelectionState>),
    /// A newer selection arrived before this one settled; its results were dropped
    Superseded { build: BuildId },
}

impl SelectOutcome {
    pub fn state(&self) -> Option<&Arc<SelectionState>> {
        match self {
            SelectOutcome::Published(state) | SelectOutcome::Unchanged(state) => Some(state),
            SelectOutcome::Superseded { .. } => None,
        }
    }
}

#[derive(Default)]
struct ControllerState {
    generation: u64,
    pending: Option<Ticket>,
    current: Option<Arc<SelectionState>>,
    subscribers: Vec<mpsc::UnboundedSender<Arc<SelectionState>>>,
}

/// Clears the pending ticket when a selection future is dropped before it settles
struct PendingTicket<'a> {
    state: &'a Mutex<ControllerState>,
    ticket: Ticket,
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.pending.as_ref() == Some(&self.ticket) {
            debug!("Selection of build {} abandoned", self.ticket.build);
            state.pending = None;
        }
    }
}

pub struct SelectionController<S> {
    source: S,
    layout: LayoutConfig,
    fetch_mode: FetchMode,
    state: Mutex<ControllerState>,
}

impl<S: DataSource> SelectionController<S> {
    pub fn new(source: S, layout: LayoutConfig, fetch_mode: FetchMode) -> Self {
        Self {
            source,
            layout,
            fetch_mode,
            state: Mutex::new(ControllerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.lock().pending.as_ref() == Some(ticket)
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// The last published selection
    pub fn current(&self) -> Option<Arc<SelectionState>> {
        self.lock().current.clone()
    }

    pub fn current_build(&self) -> Option<BuildId> {
        self.lock().current.as_ref().map(|s| s.build.clone())
    }

    pub fn phase(&self) -> Phase {
        let state = self.lock();
        match (&state.pending, &state.current) {
            (Some(ticket), _) => Phase::Loading {
                target: ticket.build.clone(),
            },
            (None, Some(current)) => Phase::Ready {
                build: current.build.clone(),
            },
            (None, None) => Phase::Idle,
        }
    }

    /// Receive every published state, one message per settled selection
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Arc<SelectionState>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Select `build` and publish its breakdowns once all of them resolved.
    ///
    /// Selecting the build that is already published, with nothing in flight,
    /// returns [`SelectOutcome::Unchanged`] without fetching. A projection
    /// failure leaves the published state untouched and is returned to the
    /// caller, unless a newer selection has superseded this one.
    pub async fn select_build(&self, build: BuildId) -> Result<SelectOutcome> {
        let ticket = {
            let mut state = self.lock();
            if state.pending.is_none() {
                if let Some(current) = state.current.as_ref().filter(|c| c.build == build) {
                    debug!("Build {} already selected", build);
                    return Ok(SelectOutcome::Unchanged(Arc::clone(current)));
                }
            }
            state.generation += 1;
            let ticket = Ticket {
                build,
                generation: state.generation,
            };
            state.pending = Some(ticket.clone());
            ticket
        };
        let _pending = PendingTicket {
            state: &self.state,
            ticket: ticket.clone(),
        };

        info!("Selecting build {}", ticket.build);

        let views = match self.fetch_views(&ticket).await {
            Ok(Some(views)) => views,
            Ok(None) => return Ok(self.superseded(ticket)),
            Err(e) => {
                let mut state = self.lock();
                if state.pending.as_ref() != Some(&ticket) {
                    debug!(
                        "Ignoring failure of superseded selection {}: {}",
                        ticket.build, e
                    );
                    return Ok(SelectOutcome::Superseded {
                        build: ticket.build,
                    });
                }
                state.pending = None;
                warn!("Failed to select build {}: {}", ticket.build, e);
                return Err(e);
            }
        };

        let next = Arc::new(SelectionState::assemble(
            ticket.build.clone(),
            views,
            &self.layout,
        ));

        let mut state = self.lock();
        if state.pending.as_ref() != Some(&ticket) {
            drop(state);
            return Ok(self.superseded(ticket));
        }
        state.pending = None;
        state.current = Some(Arc::clone(&next));
        state
            .subscribers
            .retain(|tx| tx.send(Arc::clone(&next)).is_ok());

        info!(
            "Published build {} ({} platforms, {} priorities, {} categories)",
            next.build, next.platform.cardinality, next.priority.cardinality, next.category.cardinality
        );
        Ok(SelectOutcome::Published(next))
    }

    /// Select the most recent build of the data source, if any
    pub async fn select_latest(&self) -> Result<Option<SelectOutcome>> {
        match self.source.latest().await? {
            Some(build) => Ok(Some(self.select_build(build).await?)),
            None => {
                debug!("No builds to select");
                Ok(None)
            }
        }
    }

    fn superseded(&self, ticket: Ticket) -> SelectOutcome {
        debug!(
            "Discarding results for build {} (generation {})",
            ticket.build, ticket.generation
        );
        SelectOutcome::Superseded {
            build: ticket.build,
        }
    }

    async fn fetch_views(&self, ticket: &Ticket) -> Result<Option<[BreakdownView; 3]>> {
        let build = &ticket.build;
        match self.fetch_mode {
            FetchMode::Parallel => {
                let (platform, priority, category) = tokio::try_join!(
                    self.fetch_view(Dimension::Platform, build),
                    self.fetch_view(Dimension::Priority, build),
                    self.fetch_view(Dimension::Category, build),
                )?;
                Ok(Some([platform, priority, category]))
            }
            FetchMode::Sequential => {
                let platform = self.fetch_view(Dimension::Platform, build).await?;
                if !self.is_current(ticket) {
                    return Ok(None);
                }
                let priority = self.fetch_view(Dimension::Priority, build).await?;
                if !self.is_current(ticket) {
                    return Ok(None);
                }
                let category = self.fetch_view(Dimension::Category, build).await?;
                Ok(Some([platform, priority, category]))
            }
        }
    }

    async fn fetch_view(&self, dimension: Dimension, build: &BuildId) -> Result<BreakdownView> {
        let counts = self.source.breakdown(dimension, build).await?;
        Ok(project_counts(build, dimension, &counts))
    }

    /// Breakdown tooltip for the build published at call time
    pub fn breakdown_tooltip(
        &self,
        tooltips: &Tooltips,
        status: &str,
        count: f64,
    ) -> Result<Option<String>> {
        match self.current_build() {
            Some(build) => Ok(Some(tooltips.breakdown(status, count, &build)?)),
            None => Ok(None),
        }
    }
}

impl<S: DataSource + 'static> SelectionController<S> {
    /// Interaction callback for chart clicks: runs the selection in the background
    pub fn on_point_selected(self: &Arc<Self>, build: BuildId) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = controller.select_build(build).await {
                warn!("Selection failed: {}", e);
            }
        })
    }

    /// Tooltip callback that always renders against the latest published build
    pub fn breakdown_tooltip_fn(
        self: &Arc<Self>,
        tooltips: Arc<Tooltips>,
    ) -> impl Fn(&str, f64) -> Option<String> + Send + Sync + 'static {
        let controller = Arc::clone(self);
        move |status: &str, count: f64| match controller.breakdown_tooltip(&tooltips, status, count) {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to render breakdown tooltip: {}", e);
                None
            }
        }
    }
}
