//! Service state and the command loop

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use lounge_api::{
    API_VERSION, Command, DragOutcome, ErrorCode, ErrorInfo, Event, EventPayload, Request,
    Response, ResponsePayload,
};
use lounge_config::Config;
use lounge_core::{
    CoreEngine, CoreEvent, EngineError, Journal, Point, RefreshListener, Size, SlotLayout,
    refresh_channel,
};
use lounge_store::{CsvMemberDirectory, DailyLog, JsonFileStore};
use lounge_util::format_duration;
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One line written to the client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    Response(Response),
    Event(Event),
}

/// Engine, layout and log, owned by the command loop
pub struct Service {
    engine: CoreEngine,
    layout: SlotLayout,
    log: Arc<DailyLog>,
    journal_task: JoinHandle<()>,
}

impl Service {
    /// Open every store under the configured data directory and start the
    /// journal writer. Must run inside a tokio runtime.
    pub fn open(config: &Config) -> Result<(Self, RefreshListener)> {
        let service = &config.service;
        std::fs::create_dir_all(&service.data_dir).with_context(|| {
            format!("Failed to create data directory {:?}", service.data_dir)
        })?;

        let store = Arc::new(JsonFileStore::new(
            service.sessions_file(),
            service.layout_file(),
        ));
        let members = match CsvMemberDirectory::open(&service.member_file) {
            Ok(members) => members,
            Err(e) => {
                warn!(
                    path = %service.member_file.display(),
                    error = %e,
                    "Member directory unreadable, starting with none"
                );
                CsvMemberDirectory::unloaded(&service.member_file)
            }
        };
        let members = Arc::new(members);
        let log = Arc::new(DailyLog::new(service.log_dir()));
        let (journal, journal_task) = Journal::spawn(log.clone());
        let (signal, listener) = refresh_channel();

        let engine = CoreEngine::new(&config.room, store.clone(), members, journal, signal);
        let layout = SlotLayout::load(
            store,
            config.layout,
            engine.device_ids(),
            config.room.slot_order.clone(),
        )
        .context("Failed to save the room layout")?;

        info!(
            data_dir = %service.data_dir.display(),
            log_dir = %log.dir().display(),
            "Service opened"
        );

        Ok((
            Self {
                engine,
                layout,
                log,
                journal_task,
            },
            listener,
        ))
    }

    pub fn engine(&self) -> &CoreEngine {
        &self.engine
    }

    pub fn layout(&self) -> &SlotLayout {
        &self.layout
    }

    /// Handle one raw input line
    pub fn handle_line(&mut self, line: &str, now: DateTime<Local>) -> Vec<Outbound> {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Malformed request");
                let response = Response::error(
                    request_id_of(line),
                    ErrorInfo::new(ErrorCode::InvalidRequest, format!("Malformed request: {}", e)),
                );
                return vec![Outbound::Response(response)];
            }
        };

        let (response, events) = self.handle_request(request, now);
        std::iter::once(Outbound::Response(response))
            .chain(events.into_iter().map(Outbound::Event))
            .collect()
    }

    /// Handle one request; returns the response and any events it caused
    /// besides the state refresh
    pub fn handle_request(
        &mut self,
        request: Request,
        now: DateTime<Local>,
    ) -> (Response, Vec<Event>) {
        let request_id = request.request_id;
        if request.api_version != API_VERSION {
            let info = ErrorInfo::new(
                ErrorCode::InvalidRequest,
                format!(
                    "Unsupported API version {} (expected {})",
                    request.api_version, API_VERSION
                ),
            );
            return (Response::error(request_id, info), Vec::new());
        }

        debug!(
            request_id,
            mutating = request.command.is_mutating(),
            command = ?request.command,
            "Handling request"
        );

        let mut events = Vec::new();
        let result = self.dispatch(request.command, now, &mut events);
        let response = match result {
            Ok(payload) => Response::success(request_id, payload),
            Err(info) => Response::error(request_id, info),
        };
        (response, events)
    }

    fn dispatch(
        &mut self,
        command: Command,
        now: DateTime<Local>,
        events: &mut Vec<Event>,
    ) -> Result<ResponsePayload, ErrorInfo> {
        match command {
            Command::GetState => Ok(ResponsePayload::State(self.engine.snapshot(now))),

            Command::CheckIn {
                name,
                identity,
                device,
            } => self
                .engine
                .check_in(&name, &identity, device, now)
                .map(payload_for)
                .map_err(|e| engine_error(&e)),

            Command::CheckOut { identity } => self
                .engine
                .check_out(&identity, now)
                .map(payload_for)
                .map_err(|e| engine_error(&e)),

            Command::RemoveFromQueue { identity } => self
                .engine
                .remove_from_queue(&identity, now)
                .map(payload_for)
                .map_err(|e| engine_error(&e)),

            Command::AssignQueued { identity, device } => self
                .engine
                .assign_queued_session(&identity, device, now)
                .map(payload_for)
                .map_err(|e| engine_error(&e)),

            Command::SwitchStation { identity, device } => {
                match self.engine.switch_station(&identity, device, now) {
                    Ok(event) => Ok(payload_for(event)),
                    Err(e) => {
                        if let EngineError::SwitchAndRollbackFailed {
                            identity, from, to, ..
                        } = &e
                        {
                            events.push(Event::new(EventPayload::ReconciliationRequired {
                                identity: identity.clone(),
                                from: *from,
                                to: *to,
                                message: e.to_string(),
                            }));
                        }
                        Err(engine_error(&e))
                    }
                }
            }

            Command::GetLog { day } => {
                let day = day.unwrap_or_else(|| now.date_naive());
                self.log
                    .read(day)
                    .map(|entries| ResponsePayload::Log { day, entries })
                    .map_err(|e| ErrorInfo::new(ErrorCode::StoreError, e.to_string()))
            }

            Command::SearchMembers { query } => Ok(ResponsePayload::Members {
                members: self.engine.members().search(&query),
            }),

            Command::GetLayout => Ok(ResponsePayload::Layout(self.layout.view())),

            Command::Resize { width, height } => {
                if !(width.is_finite() && height.is_finite()) {
                    return Err(ErrorInfo::new(
                        ErrorCode::InvalidRequest,
                        "Layout size must be finite",
                    ));
                }
                self.layout.resize(Size::new(width, height));
                Ok(ResponsePayload::Layout(self.layout.view()))
            }

            Command::BeginDrag { x, y } => Ok(ResponsePayload::DragStarted {
                device: self.layout.begin_drag(Point::new(x, y)),
            }),

            Command::UpdateDrag { x, y } => match self.layout.update_drag(Point::new(x, y)) {
                Some(at) => Ok(ResponsePayload::DragMoved { x: at.x, y: at.y }),
                None => Err(ErrorInfo::new(ErrorCode::InvalidRequest, "No drag in progress")),
            },

            Command::EndDrag => {
                let outcome = self
                    .layout
                    .end_drag()
                    .map_err(|e| ErrorInfo::new(ErrorCode::StoreError, e.to_string()))?;
                if matches!(outcome, DragOutcome::Moved { .. } | DragOutcome::Swapped { .. }) {
                    events.push(Event::new(EventPayload::LayoutChanged(self.layout.view())));
                }
                Ok(ResponsePayload::DragEnded { outcome })
            }

            Command::CancelDrag => {
                self.layout.cancel_drag();
                Ok(ResponsePayload::DragEnded {
                    outcome: DragOutcome::Cancelled,
                })
            }

            Command::Ping => Ok(ResponsePayload::Pong),
        }
    }

    /// Wait for every pending log write, then stop the journal writer
    pub async fn shutdown(self) {
        self.engine.journal().flush().await;

        let Self {
            engine,
            journal_task,
            ..
        } = self;
        drop(engine);
        if let Err(e) = journal_task.await {
            error!(error = %e, "Journal writer failed");
        }
    }
}

/// Run the command loop until the input ends or `shutdown` resolves.
///
/// Each input line is one request; each output line is a response or an
/// event. A `state_changed` event follows every command that changed
/// occupancy.
pub async fn serve<R, W, S>(
    mut service: Service,
    mut refresh: RefreshListener,
    input: R,
    mut output: W,
    shutdown: S,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut lines = BufReader::new(input).lines();
    tokio::pin!(shutdown);

    info!("Service running");

    loop {
        tokio::select! {
            biased;

            true = refresh.changed() => {
                let snapshot = service.engine.snapshot(lounge_util::now());
                let event = Event::new(EventPayload::StateChanged(snapshot));
                write_line(&mut output, &Outbound::Event(event)).await?;
            }

            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    info!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                for out in service.handle_line(&line, lounge_util::now()) {
                    write_line(&mut output, &out).await?;
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    // Occupancy changed by the last command, not yet reported
    if refresh.try_take() {
        let snapshot = service.engine.snapshot(lounge_util::now());
        write_line(&mut output, &Outbound::Event(Event::new(EventPayload::StateChanged(snapshot))))
            .await?;
    }

    service.shutdown().await;
    write_line(&mut output, &Outbound::Event(Event::new(EventPayload::Shutdown))).await?;

    info!("Shutdown complete");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, out: &Outbound) -> Result<()> {
    let mut json = serde_json::to_vec(out).context("Failed to encode output")?;
    json.push(b'\n');
    output.write_all(&json).await.context("Failed to write output")?;
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}

/// Best-effort request id of a line that failed to parse as a request
fn request_id_of(line: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("request_id")?.as_u64())
        .unwrap_or(0)
}

fn payload_for(event: CoreEvent) -> ResponsePayload {
    match event {
        CoreEvent::CheckedIn { session } => ResponsePayload::CheckedIn { session },
        CoreEvent::CheckedOut {
            identity,
            device,
            usage,
            ..
        } => ResponsePayload::CheckedOut {
            identity,
            device,
            usage: format_duration(usage),
        },
        CoreEvent::Dequeued { identity, .. } => ResponsePayload::Dequeued { identity },
        CoreEvent::Assigned { identity, device } => ResponsePayload::Assigned { identity, device },
        CoreEvent::Switched { identity, from, to } => {
            ResponsePayload::Switched { identity, from, to }
        }
    }
}

fn engine_error(e: &EngineError) -> ErrorInfo {
    let code = match e {
        EngineError::DuplicateSession { .. } => ErrorCode::DuplicateSession,
        EngineError::SessionNotFound(_) => ErrorCode::SessionNotFound,
        EngineError::SessionNotQueued { .. } => ErrorCode::SessionNotQueued,
        EngineError::AlreadyAssigned { .. } => ErrorCode::AlreadyAssigned,
        EngineError::DeviceNotFound(_) => ErrorCode::DeviceNotFound,
        EngineError::DeviceBusy { .. } => ErrorCode::DeviceBusy,
        EngineError::SameDevice { .. } => ErrorCode::SameDevice,
        EngineError::SessionQueued(_) => ErrorCode::SessionQueued,
        EngineError::SwitchRolledBack { .. } => ErrorCode::SwitchRolledBack,
        EngineError::SwitchAndRollbackFailed { .. } => ErrorCode::SwitchAndRollbackFailed,
        EngineError::Store(_) => ErrorCode::StoreError,
    };
    ErrorInfo::new(code, e.to_string())
}
