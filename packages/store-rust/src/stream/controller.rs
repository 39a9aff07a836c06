//! Paginated change streams.
//!
//! [`StreamController::watch`] spawns one background task per stream. The
//! task fetches the current window, then re-fetches whenever the page cursor
//! moves or a committed mutation touches the watched entity, and emits the
//! difference as [`ChangeEvent`]s. A newer window always supersedes a fetch
//! still in flight. Dropping the [`EventStream`] cancels the task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use recordkit_core::{
    group_into_sections, next_page, CursorDirection, Operation, Pagination, Predicate, Record,
    Request, RequestError, RequestResult, Section, SortDescriptor,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info_span, warn, Instrument};

use super::diff::{diff_windows, WindowDiff};
use super::event::{Change, ChangeEvent};
use super::notifier::{ChangeNotifier, StoreNotice};
use crate::service::{Execution, RequestProcessor, ResultProcessor};

/// Names the section a record belongs to.
pub type SectionKey = Arc<dyn Fn(&Record) -> String + Send + Sync>;

/// What a stream watches and how it slices it.
#[derive(Clone)]
pub struct StreamOptions {
    pub entity: String,
    pub predicate: Option<Predicate>,
    pub sort: Vec<SortDescriptor>,
    /// `None` watches the whole result set.
    pub pagination: Option<Pagination>,
    /// `None` puts every record into one unnamed section.
    pub section_key: Option<SectionKey>,
}

impl StreamOptions {
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
            sort: Vec::new(),
            pagination: None,
            section_key: None,
        }
    }

    #[must_use]
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: Vec<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    #[must_use]
    pub fn sectioned_by<F>(mut self, key: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        self.section_key = Some(Arc::new(key));
        self
    }

    fn request_for(&self, page: u32) -> RequestResult<Request> {
        let mut builder = Request::builder()
            .operation(Operation::Fetch)
            .entity(self.entity.clone())
            .sort(self.sort.clone())
            .description(format!("stream {}", self.entity));
        if let Some(predicate) = &self.predicate {
            builder = builder.predicate(predicate.clone());
        }
        if let Some(pagination) = &self.pagination {
            let window = pagination.window(page);
            builder = builder.fetch_limit(window.limit).fetch_offset(window.offset);
        }
        Ok(builder.build()?)
    }

    fn sectioned(&self, records: Vec<Record>) -> Vec<Section<Record>> {
        match &self.section_key {
            Some(key) => group_into_sections(records, |record: &Record| key(record)),
            None if records.is_empty() => Vec::new(),
            None => vec![Section::new("", records)],
        }
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Moves the page of one stream. Pages start at 1.
pub struct PageCursor {
    page: watch::Sender<u32>,
}

impl PageCursor {
    #[must_use]
    pub fn page(&self) -> u32 {
        *self.page.borrow()
    }

    /// Applies `direction`. Returns `false`, and triggers no fetch, when the
    /// page stays the same.
    pub fn move_page(&self, direction: CursorDirection) -> bool {
        self.page.send_if_modified(|page| {
            let next = next_page(*page, direction);
            if next == *page {
                return false;
            }
            *page = next;
            true
        })
    }

    /// Whether the stream task behind this cursor has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.page.is_closed()
    }
}

/// Events of one watched entity. Dropping it stops the background task.
pub struct EventStream<T> {
    events: mpsc::Receiver<RequestResult<ChangeEvent<T>>>,
    _guard: DropGuard,
}

impl<T> Stream for EventStream<T> {
    type Item = RequestResult<ChangeEvent<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().events.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// StreamController
// ---------------------------------------------------------------------------

/// Creates change streams over a [`RequestProcessor`].
///
/// `notifier` must be registered as an observer on the adapter behind the
/// processor, otherwise streams only refresh on page changes.
#[derive(Clone)]
pub struct StreamController {
    processor: RequestProcessor,
    notifier: Arc<ChangeNotifier>,
}

impl StreamController {
    #[must_use]
    pub fn new(processor: RequestProcessor, notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            processor,
            notifier,
        }
    }

    /// Starts watching `options.entity`, converting records with `results`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn watch<R: ResultProcessor>(
        &self,
        options: StreamOptions,
        results: R,
    ) -> (EventStream<R::Output>, PageCursor) {
        let capacity = self.processor.config().event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (page_tx, page_rx) = watch::channel(recordkit_core::pagination::FIRST_PAGE);
        let notices = self.notifier.subscribe();
        let cancel = CancellationToken::new();

        let span = info_span!("change_stream", entity = %options.entity);
        let task = StreamTask {
            processor: self.processor.clone(),
            options,
            results,
            events: event_tx,
            current: Vec::new(),
            generation: 0,
        };
        tokio::spawn(task.run(page_rx, notices, cancel.clone()).instrument(span));

        (
            EventStream {
                events: event_rx,
                _guard: cancel.drop_guard(),
            },
            PageCursor { page: page_tx },
        )
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

/// Why a fetch was issued. Later variants announce a full load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Reason {
    Notice,
    PageChange,
    Initial,
}

type FetchFuture = Pin<Box<dyn Future<Output = RequestResult<Vec<Record>>> + Send>>;

struct InFlight {
    generation: u64,
    reason: Reason,
    fetch: FetchFuture,
}

enum Step {
    Stop,
    PageMoved,
    CursorDropped,
    Notice(Result<StoreNotice, RecvError>),
    Fetched(RequestResult<Vec<Record>>),
}

async fn next_fetch(in_flight: &mut Option<InFlight>) -> RequestResult<Vec<Record>> {
    match in_flight {
        Some(flight) => flight.fetch.as_mut().await,
        None => std::future::pending().await,
    }
}

struct StreamTask<R: ResultProcessor> {
    processor: RequestProcessor,
    options: StreamOptions,
    results: R,
    events: mpsc::Sender<RequestResult<ChangeEvent<R::Output>>>,
    current: Vec<Section<Record>>,
    generation: u64,
}

impl<R: ResultProcessor> StreamTask<R> {
    async fn run(
        mut self,
        mut page_rx: watch::Receiver<u32>,
        mut notices: broadcast::Receiver<StoreNotice>,
        cancel: CancellationToken,
    ) {
        let mut page = *page_rx.borrow_and_update();
        let mut in_flight = Some(self.start(Reason::Initial, page));
        let mut cursor_open = true;
        let mut notices_open = true;

        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Stop,
                changed = page_rx.changed(), if cursor_open => match changed {
                    Ok(()) => Step::PageMoved,
                    Err(_) => Step::CursorDropped,
                },
                notice = notices.recv(), if notices_open => Step::Notice(notice),
                fetched = next_fetch(&mut in_flight) => Step::Fetched(fetched),
            };

            match step {
                Step::Stop => break,
                Step::CursorDropped => cursor_open = false,
                Step::PageMoved => {
                    page = *page_rx.borrow_and_update();
                    debug!(page, "page moved");
                    let reason = pending_reason(in_flight.as_ref()).max(Reason::PageChange);
                    self.supersede(&mut in_flight, reason, page);
                }
                Step::Notice(notice) => {
                    match notice {
                        Ok(StoreNotice::Changed { entity }) if entity != self.options.entity => continue,
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => debug!(skipped, "notices lagged"),
                        Err(RecvError::Closed) => {
                            notices_open = false;
                            continue;
                        }
                    }
                    let reason = pending_reason(in_flight.as_ref()).max(Reason::Notice);
                    self.supersede(&mut in_flight, reason, page);
                }
                Step::Fetched(result) => {
                    let Some(flight) = in_flight.take() else {
                        continue;
                    };
                    if !self.apply(flight.reason, result).await {
                        break;
                    }
                }
            }
        }
        debug!("change stream stopped");
    }

    fn start(&mut self, reason: Reason, page: u32) -> InFlight {
        self.generation += 1;
        let processor = self.processor.clone();
        let request = self.options.request_for(page);
        InFlight {
            generation: self.generation,
            reason,
            fetch: Box::pin(async move {
                match processor.execute(request?).await? {
                    Execution::Fetched(records) => Ok(records),
                    Execution::Applied(_) | Execution::Completed => Ok(Vec::new()),
                }
            }),
        }
    }

    fn supersede(&mut self, in_flight: &mut Option<InFlight>, reason: Reason, page: u32) {
        if let Some(stale) = in_flight.take() {
            debug!(generation = stale.generation, "superseded fetch discarded");
        }
        *in_flight = Some(self.start(reason, page));
    }

    /// Emits the events for one finished fetch. Returns `false` once the
    /// consumer is gone.
    async fn apply(&mut self, reason: Reason, result: RequestResult<Vec<Record>>) -> bool {
        let announce = reason != Reason::Notice;
        let mut out = Vec::new();

        match result {
            Err(err) => {
                warn!(error = %err, "stream fetch failed");
                if announce {
                    out.push(Ok(ChangeEvent::WillLoad));
                    out.push(Err(err));
                    self.push_did_load(&mut out);
                } else {
                    out.push(Err(err));
                }
            }
            Ok(records) => {
                let sections = self.options.sectioned(records);
                let diff = if reason == Reason::Initial {
                    Vec::new()
                } else {
                    diff_windows(&self.current, &sections)
                };
                self.current = sections;
                if !announce && diff.is_empty() {
                    return true;
                }
                out.push(Ok(ChangeEvent::WillLoad));
                if !diff.is_empty() {
                    out.push(Ok(ChangeEvent::WillChange));
                    out.extend(diff.into_iter().map(|d| self.event_for(d)));
                    out.push(Ok(ChangeEvent::DidChange));
                }
                self.push_did_load(&mut out);
            }
        }

        for event in out {
            if self.events.send(event).await.is_err() {
                return false;
            }
        }
        true
    }

    fn convert(&self, record: Record) -> RequestResult<R::Output> {
        self.results.process(record).map_err(RequestError::Processor)
    }

    fn event_for(&self, diff: WindowDiff) -> RequestResult<ChangeEvent<R::Output>> {
        Ok(match diff {
            WindowDiff::DeleteSection(change) => ChangeEvent::DeleteSection(change),
            WindowDiff::InsertSection(change) => ChangeEvent::InsertSection(change),
            WindowDiff::UpdateSection(change) => ChangeEvent::UpdateSection(change),
            WindowDiff::Delete { record, old_index } => ChangeEvent::Delete(Change {
                object: self.convert(record)?,
                old_index: Some(old_index),
                new_index: None,
            }),
            WindowDiff::Insert { record, new_index } => ChangeEvent::Insert(Change {
                object: self.convert(record)?,
                old_index: None,
                new_index: Some(new_index),
            }),
            WindowDiff::Update {
                record,
                old_index,
                new_index,
            } => ChangeEvent::Update(Change {
                object: self.convert(record)?,
                old_index: Some(old_index),
                new_index: Some(new_index),
            }),
        })
    }

    /// Converts the current window; conversion failures are emitted ahead of
    /// `DidLoad` and their objects left out.
    fn push_did_load(&self, out: &mut Vec<RequestResult<ChangeEvent<R::Output>>>) {
        let mut sections = Vec::with_capacity(self.current.len());
        for section in &self.current {
            let mut objects = Vec::with_capacity(section.len());
            for record in &section.objects {
                match self.convert(record.clone()) {
                    Ok(object) => objects.push(object),
                    Err(err) => out.push(Err(err)),
                }
            }
            sections.push(Section::new(section.name.clone(), objects));
        }
        out.push(Ok(ChangeEvent::DidLoad(sections)));
    }
}

fn pending_reason(in_flight: Option<&InFlight>) -> Reason {
    in_flight.map_or(Reason::Notice, |flight| flight.reason)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
