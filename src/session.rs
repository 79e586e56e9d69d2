use crate::prelude::*;

// close code the console server uses when the user logs out elsewhere
const CLOSE_LOGGED_OUT: u16 = 4001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Connecting,
    Active,
    Exited,
    Closed,
    AwaitingRestart,
}

impl State {
    pub fn name(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Exited => "exited",
            Self::Closed => "closed",
            Self::AwaitingRestart => "awaiting_restart",
        }
    }

    pub fn is_finished(self) -> bool {
        match self {
            Self::Connecting | Self::Active => false,
            Self::Exited | Self::Closed | Self::AwaitingRestart => true,
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    // the remote program finished and the server told us so
    Exited { code: Option<i32> },
    // the connection went away without an exit message
    Closed { code: Option<u16> },
}

impl Ending {
    pub fn notice(self) -> String {
        match self {
            Self::Exited { code: None } => "Process Finished.".to_string(),
            Self::Exited { code: Some(code) } => {
                format!("Process Finished (exit code {}).", code)
            }
            Self::Closed {
                code: Some(CLOSE_LOGGED_OUT),
            } => "Logged out.".to_string(),
            Self::Closed { .. } => "Connection closed.".to_string(),
        }
    }

    pub fn is_graceful(self) -> bool {
        match self {
            Self::Exited { .. } => true,
            Self::Closed { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Output(String),
    Cwd(String),
    Ended(Ending),
}

pub struct Session<T: crate::transport::Transport> {
    id: String,
    transport: Option<T>,
    framing: crate::protocol::Framing,
    state: State,
    resizer: crate::resize::Coordinator,
    resize_timer: Option<tokio::timer::Delay>,
    ending: Option<Ending>,
}

impl<T: crate::transport::Transport> Session<T> {
    pub fn new(
        transport: T,
        framing: crate::protocol::Framing,
        resize_policy: crate::resize::Policy,
    ) -> Self {
        let id = format!("{}", uuid::Uuid::new_v4());
        log::info!("{}: new {} session", id, framing.framing_type().name());
        Self {
            id,
            transport: Some(transport),
            framing,
            state: State::Connecting,
            resizer: crate::resize::Coordinator::new(resize_policy),
            resize_timer: None,
            ending: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn input(&mut self, data: &str) {
        self.send(&crate::protocol::Message::input(data));
    }

    pub fn resize(&mut self, size: crate::term::Size) {
        if self.state.is_finished() {
            log::debug!(
                "{}: dropping resize to {}: {}",
                self.id,
                size,
                self.state
            );
            return;
        }
        let now = std::time::Instant::now();
        if let Some(size) = self.resizer.notify(size, now) {
            self.send(&crate::protocol::Message::resize(size));
        } else if let Some(deadline) = self.resizer.deadline() {
            self.resize_timer = Some(tokio::timer::Delay::new(deadline));
        }
    }

    // the restart affordance has been shown, nothing more happens here
    pub fn await_restart(&mut self) {
        match self.state {
            State::Exited | State::Closed => {
                self.set_state(State::AwaitingRestart);
            }
            state => {
                log::warn!(
                    "{}: can't await restart while {}",
                    self.id,
                    state
                );
            }
        }
    }

    // teardown from the hosting view: no ending is reported
    pub fn close(&mut self) {
        self.release();
        self.ending = None;
        if !self.state.is_finished() {
            self.set_state(State::Closed);
        }
    }

    fn set_state(&mut self, state: State) {
        log::debug!("{}: {} -> {}", self.id, self.state, state);
        self.state = state;
    }

    fn send(&mut self, msg: &crate::protocol::Message) {
        if self.state != State::Active {
            log::debug!(
                "{}: dropping outbound message while {}",
                self.id,
                self.state
            );
            return;
        }
        let transport = if let Some(transport) = &mut self.transport {
            transport
        } else {
            return;
        };
        match self.framing.encode(msg) {
            Ok(Some(payload)) => {
                msg.log(&self.id);
                transport.send(payload);
            }
            Ok(None) => {
                log::debug!(
                    "{}: {} framing can't carry {:?}",
                    self.id,
                    self.framing.framing_type().name(),
                    msg
                );
            }
            Err(e) => {
                log::error!("{}: {}", self.id, e);
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.resize_timer = None;
        self.resizer.cancel();
    }

    fn finish(&mut self, ending: Ending) {
        self.set_state(if ending.is_graceful() {
            State::Exited
        } else {
            State::Closed
        });
        self.release();
        self.ending = Some(ending);
    }

    fn open(&mut self) {
        self.set_state(State::Active);
        if let Some(msg) = self.framing.handshake() {
            self.send(&msg);
        }
        if let Some(size) = self.resizer.geometry() {
            self.send(&crate::protocol::Message::resize(size));
        }
    }

    fn handle_transport_event(
        &mut self,
        event: crate::transport::Event,
    ) -> Option<Event> {
        match (self.state, event) {
            (_, crate::transport::Event::Closed { code }) => {
                log::info!("{}: connection closed ({:?})", self.id, code);
                self.finish(Ending::Closed { code });
                None
            }
            (State::Connecting, crate::transport::Event::Opened) => {
                self.open();
                None
            }
            (State::Connecting, crate::transport::Event::Error(e)) => {
                log::error!("{}: {}", self.id, e);
                self.finish(Ending::Closed { code: None });
                None
            }
            (State::Connecting, crate::transport::Event::Message(_)) => {
                log::debug!("{}: dropping message before open", self.id);
                None
            }
            (State::Active, crate::transport::Event::Message(payload)) => {
                self.handle_payload(&payload)
            }
            (State::Active, crate::transport::Event::Error(e)) => {
                log::error!("{}: {}", self.id, e);
                None
            }
            (state, event) => {
                log::warn!("{}: unexpected {:?} while {}", self.id, event, state);
                None
            }
        }
    }

    fn handle_payload(&mut self, payload: &str) -> Option<Event> {
        let msg = match self.framing.decode(payload) {
            Ok(msg) => msg,
            Err(e) if e.is_decode_error() => {
                log::warn!("{}: dropping message: {}", self.id, e);
                return None;
            }
            Err(e) => {
                log::error!("{}: {}", self.id, e);
                return None;
            }
        };
        msg.log(&self.id);
        match msg {
            crate::protocol::Message::Data { data } => {
                Some(Event::Output(data))
            }
            crate::protocol::Message::Cwd { path } => Some(Event::Cwd(path)),
            crate::protocol::Message::Exit { code } => {
                self.finish(Ending::Exited { code });
                None
            }
            crate::protocol::Message::Unhandled { ty } => {
                log::warn!("{}: unhandled message type {}", self.id, ty);
                None
            }
            msg => {
                log::warn!("{}: unexpected message {:?}", self.id, msg);
                None
            }
        }
    }
}

impl<T: crate::transport::Transport + 'static> Session<T> {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            Option<Event>,
            Error,
        >] = &[
        &Self::poll_ending,
        &Self::poll_transport,
        &Self::poll_resize_timer,
    ];

    fn poll_ending(&mut self) -> component_future::Poll<Option<Event>, Error> {
        if let Some(ending) = self.ending.take() {
            return Ok(component_future::Async::Ready(Some(Event::Ended(
                ending,
            ))));
        }
        if self.state.is_finished() {
            return Ok(component_future::Async::Ready(None));
        }
        Ok(component_future::Async::NothingToDo)
    }

    fn poll_transport(
        &mut self,
    ) -> component_future::Poll<Option<Event>, Error> {
        let transport = if let Some(transport) = &mut self.transport {
            transport
        } else {
            return Ok(component_future::Async::NothingToDo);
        };
        let event = match component_future::try_ready!(transport.poll()) {
            Some(event) => event,
            None => crate::transport::Event::Closed { code: None },
        };
        if let Some(event) = self.handle_transport_event(event) {
            Ok(component_future::Async::Ready(Some(event)))
        } else {
            Ok(component_future::Async::DidWork)
        }
    }

    fn poll_resize_timer(
        &mut self,
    ) -> component_future::Poll<Option<Event>, Error> {
        let timer = if let Some(timer) = &mut self.resize_timer {
            timer
        } else {
            return Ok(component_future::Async::NothingToDo);
        };
        component_future::try_ready!(timer
            .poll()
            .context(crate::error::Timer));
        self.resize_timer = None;
        if let Some(size) =
            self.resizer.poll_due(std::time::Instant::now())
        {
            self.send(&crate::protocol::Message::resize(size));
        } else if let Some(deadline) = self.resizer.deadline() {
            // pushed back by a later notification
            self.resize_timer = Some(tokio::timer::Delay::new(deadline));
        }
        Ok(component_future::Async::DidWork)
    }
}

#[must_use = "streams do nothing unless polled"]
impl<T: crate::transport::Transport + 'static> futures::Stream
    for Session<T>
{
    type Item = Event;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        component_future::poll_stream(self, Self::POLL_FNS)
    }
}
