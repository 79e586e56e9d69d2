use crate::prelude::*;
use tokio_tungstenite::tungstenite;

pub enum Event {
    Opened,
    Message(String),
    // always followed by Closed once the socket is unusable
    Error(Error),
    Closed { code: Option<u16> },
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Opened => f.write_str("Opened"),
            Self::Message(payload) => {
                write!(f, "Message({} bytes)", payload.len())
            }
            Self::Error(e) => write!(f, "Error({})", e),
            Self::Closed { code } => write!(f, "Closed({:?})", code),
        }
    }
}

// the socket a session talks through. inbound traffic and lifecycle changes
// arrive as stream items, outbound payloads are queued with send and
// written in order.
pub trait Transport: futures::Stream<Item = Event, Error = Error> {
    fn send(&mut self, payload: String);
    fn close(&mut self);
}

pub fn endpoint(origin: &url::Url, path: &str) -> Result<url::Url> {
    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        scheme => {
            return Err(Error::UnsupportedScheme {
                scheme: scheme.to_string(),
            })
        }
    };
    let mut url = origin
        .join(path)
        .context(crate::error::ParseUrl { input: path })?;
    url.set_scheme(scheme)
        .map_err(|_| Error::UnsupportedScheme {
            scheme: origin.scheme().to_string(),
        })?;
    Ok(url)
}

type ConnectFuture = Box<
    dyn futures::Future<Item = (MessageSink, MessageStream), Error = Error>
        + Send,
>;
type MessageSink = Box<
    dyn futures::Sink<SinkItem = tungstenite::Message, SinkError = Error>
        + Send,
>;
type MessageStream = Box<
    dyn futures::Stream<Item = tungstenite::Message, Error = Error> + Send,
>;

enum SenderState {
    Temporary,
    Connected(MessageSink),
    Sending(
        Box<dyn futures::Future<Item = MessageSink, Error = Error> + Send>,
    ),
}

enum ConnectionState {
    Connecting(ConnectFuture),
    Connected(SenderState, MessageStream),
    Closed,
}

pub struct Connection {
    url: url::Url,
    state: ConnectionState,
    to_send: std::collections::VecDeque<tungstenite::Message>,
    events: std::collections::VecDeque<Event>,
    close_code: Option<u16>,
}

impl Connection {
    pub fn connect(url: &url::Url) -> Self {
        log::info!("connecting to {}", url);
        let fut = tokio_tungstenite::connect_async(url.clone())
            .context(crate::error::Connect {
                url: url.to_string(),
            })
            .map(|(stream, _)| {
                let (sink, stream) = stream.split();
                let sink: MessageSink = Box::new(
                    sink.sink_map_err(|e| Error::WebSocket { source: e }),
                );
                let stream: MessageStream =
                    Box::new(stream.context(crate::error::WebSocket));
                (sink, stream)
            });
        Self {
            url: url.clone(),
            state: ConnectionState::Connecting(Box::new(fut)),
            to_send: std::collections::VecDeque::new(),
            events: std::collections::VecDeque::new(),
            close_code: None,
        }
    }

    fn handle_message(&mut self, msg: tungstenite::Message) {
        match msg {
            tungstenite::Message::Text(text) => {
                self.events.push_back(Event::Message(text));
            }
            tungstenite::Message::Binary(data) => {
                self.events.push_back(Event::Message(
                    String::from_utf8_lossy(&data).into_owned(),
                ));
            }
            // tungstenite queues the pong itself
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => {
            }
            tungstenite::Message::Close(frame) => {
                log::debug!("close frame from {}: {:?}", self.url, frame);
                self.close_code = frame.map(|frame| frame.code.into());
            }
        }
    }

    fn fail(&mut self, e: Error) {
        log::warn!("connection to {} failed: {}", self.url, e);
        self.events.push_back(Event::Error(e));
        self.finish();
    }

    fn finish(&mut self) {
        self.state = ConnectionState::Closed;
        self.to_send.clear();
        self.events.push_back(Event::Closed {
            code: self.close_code,
        });
    }
}

impl Connection {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            Option<Event>,
            Error,
        >] = &[
        &Self::poll_events,
        &Self::poll_connect,
        &Self::poll_write,
        &Self::poll_read,
    ];

    fn poll_events(&mut self) -> component_future::Poll<Option<Event>, Error> {
        if let Some(event) = self.events.pop_front() {
            return Ok(component_future::Async::Ready(Some(event)));
        }
        if let ConnectionState::Closed = self.state {
            return Ok(component_future::Async::Ready(None));
        }
        Ok(component_future::Async::NothingToDo)
    }

    fn poll_connect(
        &mut self,
    ) -> component_future::Poll<Option<Event>, Error> {
        let fut = match &mut self.state {
            ConnectionState::Connecting(fut) => fut,
            _ => return Ok(component_future::Async::NothingToDo),
        };
        match fut.poll() {
            Ok(futures::Async::Ready((sink, stream))) => {
                log::info!("connected to {}", self.url);
                self.state = ConnectionState::Connected(
                    SenderState::Connected(sink),
                    stream,
                );
                self.events.push_back(Event::Opened);
                Ok(component_future::Async::DidWork)
            }
            Ok(futures::Async::NotReady) => {
                Ok(component_future::Async::NotReady)
            }
            Err(e) => {
                self.fail(e);
                Ok(component_future::Async::DidWork)
            }
        }
    }

    fn poll_write(&mut self) -> component_future::Poll<Option<Event>, Error> {
        let sender = match &mut self.state {
            ConnectionState::Connected(sender, _) => sender,
            _ => return Ok(component_future::Async::NothingToDo),
        };
        match sender {
            SenderState::Temporary => unreachable!(),
            SenderState::Connected(_) => {
                let msg = if let Some(msg) = self.to_send.pop_front() {
                    msg
                } else {
                    return Ok(component_future::Async::NothingToDo);
                };
                let fut =
                    match std::mem::replace(sender, SenderState::Temporary) {
                        SenderState::Connected(sink) => sink.send(msg),
                        _ => unreachable!(),
                    };
                *sender = SenderState::Sending(Box::new(fut));
                Ok(component_future::Async::DidWork)
            }
            SenderState::Sending(fut) => match fut.poll() {
                Ok(futures::Async::Ready(sink)) => {
                    *sender = SenderState::Connected(sink);
                    Ok(component_future::Async::DidWork)
                }
                Ok(futures::Async::NotReady) => {
                    Ok(component_future::Async::NotReady)
                }
                Err(e) => {
                    self.fail(e);
                    Ok(component_future::Async::DidWork)
                }
            },
        }
    }

    fn poll_read(&mut self) -> component_future::Poll<Option<Event>, Error> {
        let stream = match &mut self.state {
            ConnectionState::Connected(_, stream) => stream,
            _ => return Ok(component_future::Async::NothingToDo),
        };
        match stream.poll() {
            Ok(futures::Async::Ready(Some(msg))) => {
                self.handle_message(msg);
                Ok(component_future::Async::DidWork)
            }
            Ok(futures::Async::Ready(None)) => {
                log::info!("disconnected from {}", self.url);
                self.finish();
                Ok(component_future::Async::DidWork)
            }
            Ok(futures::Async::NotReady) => {
                Ok(component_future::Async::NotReady)
            }
            Err(e) => {
                self.fail(e);
                Ok(component_future::Async::DidWork)
            }
        }
    }
}

#[must_use = "streams do nothing unless polled"]
impl futures::Stream for Connection {
    type Item = Event;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        component_future::poll_stream(self, Self::POLL_FNS)
    }
}

impl Transport for Connection {
    fn send(&mut self, payload: String) {
        if let ConnectionState::Connected(..) = self.state {
            self.to_send.push_back(tungstenite::Message::Text(payload));
        } else {
            log::debug!("dropping send on {}: not connected", self.url);
        }
    }

    fn close(&mut self) {
        if let ConnectionState::Closed = self.state {
            return;
        }
        log::info!("closing connection to {}", self.url);
        self.state = ConnectionState::Closed;
        self.to_send.clear();
        self.events.clear();
    }
}
