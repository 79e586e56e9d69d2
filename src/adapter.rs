use crate::prelude::*;

// binds one terminal view to the session currently attached to it
pub struct Adapter<W: crate::widget::Widget, T: crate::transport::Transport> {
    widget: W,
    session: crate::session::Session<T>,
}

impl<W: crate::widget::Widget, T: crate::transport::Transport> Adapter<W, T> {
    pub fn new(widget: W, session: crate::session::Session<T>) -> Self {
        Self { widget, session }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    pub fn session(&self) -> &crate::session::Session<T> {
        &self.session
    }

    pub fn on_mount(&mut self) -> Result<()> {
        self.widget.focus()?;
        self.on_resize()
    }

    pub fn on_resize(&mut self) -> Result<()> {
        let size = self.widget.fit()?;
        self.session.resize(size);
        Ok(())
    }

    pub fn on_widget_input(&mut self, data: &str) {
        self.session.input(data);
    }

    pub fn on_decoded_data(&mut self, data: &str) -> Result<()> {
        self.widget.write(data)
    }

    pub fn on_click(&mut self) -> Result<()> {
        self.widget.focus()
    }

    pub fn restart(
        &mut self,
        session: crate::session::Session<T>,
    ) -> Result<()> {
        log::info!(
            "replacing session {} with {}",
            self.session.id(),
            session.id()
        );
        self.session.close();
        self.session = session;
        self.widget.write("\r\n")?;
        self.on_mount()
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    fn end(&mut self, ending: crate::session::Ending) -> Result<()> {
        self.widget.write(&format!("\r\n{}\r\n", ending.notice()))?;
        self.widget.show_restart(&ending)?;
        self.session.await_restart();
        Ok(())
    }
}

#[must_use = "futures do nothing unless polled"]
impl<W: crate::widget::Widget, T: crate::transport::Transport + 'static>
    futures::Future
    for Adapter<W, T>
{
    type Item = crate::session::Ending;
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Self::Item, Self::Error> {
        loop {
            match futures::try_ready!(self.session.poll()) {
                Some(crate::session::Event::Output(data)) => {
                    self.on_decoded_data(&data)?;
                }
                Some(crate::session::Event::Cwd(path)) => {
                    self.widget.set_title(&path)?;
                }
                Some(crate::session::Event::Ended(ending)) => {
                    self.end(ending)?;
                    return Ok(futures::Async::Ready(ending));
                }
                // torn down with close(), nothing to show
                None => {
                    return Ok(futures::Async::Ready(
                        crate::session::Ending::Closed { code: None },
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::transport::{mock, Event as TransportEvent};

    fn message(payload: &str) -> TransportEvent {
        TransportEvent::Message(payload.to_string())
    }

    fn adapter(
        events: Vec<TransportEvent>,
    ) -> (
        Adapter<crate::widget::headless::Widget, mock::Transport>,
        mock::Handle,
    ) {
        let (transport, handle) = mock::Transport::new(events);
        let session = crate::session::Session::new(
            transport,
            crate::protocol::Framing::structured("/bin/bash"),
            crate::resize::Policy::Immediate,
        );
        (
            Adapter::new(crate::widget::headless::Widget::new(), session),
            handle,
        )
    }

    fn pending<
        W: crate::widget::Widget,
        T: crate::transport::Transport + 'static,
    >(
        adapter: &mut Adapter<W, T>,
    ) {
        match adapter.poll().unwrap() {
            futures::Async::Ready(ending) => {
                panic!("unexpected ending {:?}", ending)
            }
            futures::Async::NotReady => {}
        }
    }

    #[test]
    fn test_interactive_session() {
        let (mut adapter, handle) = adapter(vec![
            TransportEvent::Opened,
            message(r#"{"type":"data","data":"$ "}"#),
        ]);
        adapter.on_mount().unwrap();
        assert_eq!(adapter.widget().focused, 1);
        pending(&mut adapter);
        assert!(adapter.widget().contents().starts_with("$"));

        adapter.on_widget_input("ls\r");
        handle.push(message(r#"{"type":"data","data":"ls\r\nfoo\r\n$ "}"#));
        pending(&mut adapter);
        let contents = adapter.widget().contents();
        assert!(contents.contains("$ ls"));
        assert!(contents.contains("foo"));
        assert_eq!(
            handle.sent(),
            vec![
                r#"{"command":"/bin/bash"}"#,
                r#"{"type":"resize","cols":80,"rows":24}"#,
                r#"{"type":"input","data":"ls\r"}"#,
            ]
        );
    }

    #[test]
    fn test_resize_follows_widget() {
        let (mut adapter, handle) = adapter(vec![TransportEvent::Opened]);
        adapter.on_mount().unwrap();
        pending(&mut adapter);
        adapter
            .widget_mut()
            .set_size(crate::term::Size { rows: 40, cols: 120 });
        adapter.on_resize().unwrap();
        // not laid out yet, nothing goes out
        adapter
            .widget_mut()
            .set_size(crate::term::Size { rows: 0, cols: 0 });
        adapter.on_resize().unwrap();
        assert_eq!(
            handle.sent(),
            vec![
                r#"{"command":"/bin/bash"}"#,
                r#"{"type":"resize","cols":80,"rows":24}"#,
                r#"{"type":"resize","cols":120,"rows":40}"#,
            ]
        );
    }

    #[test]
    fn test_cwd_sets_title() {
        let (mut adapter, _handle) = adapter(vec![
            TransportEvent::Opened,
            message(r#"{"type":"cwd","path":"/var/log"}"#),
        ]);
        pending(&mut adapter);
        assert_eq!(adapter.widget().title, Some("/var/log".to_string()));
    }

    #[test]
    fn test_exit_shows_restart() {
        let (adapter, handle) = adapter(vec![
            TransportEvent::Opened,
            message(r#"{"type":"data","data":"bye\r\n"}"#),
            message(r#"{"type":"exit"}"#),
        ]);
        let ending = adapter.wait().unwrap();
        assert_eq!(ending, crate::session::Ending::Exited { code: None });
        assert!(handle.is_closed());
    }

    #[test]
    fn test_ending_overlay() {
        let (mut adapter, _handle) = adapter(vec![
            TransportEvent::Opened,
            TransportEvent::Closed { code: Some(1006) },
        ]);
        let ending = match adapter.poll().unwrap() {
            futures::Async::Ready(ending) => ending,
            futures::Async::NotReady => panic!("adapter not ready"),
        };
        assert_eq!(ending, crate::session::Ending::Closed { code: Some(1006) });
        assert_eq!(
            adapter.session().state(),
            crate::session::State::AwaitingRestart
        );
        assert_eq!(adapter.widget().restart_shown, vec![ending]);
        assert!(adapter.widget().contents().contains("Connection closed."));
    }

    #[test]
    fn test_restart() {
        let (mut adapter, old) = adapter(vec![
            TransportEvent::Opened,
            message(r#"{"type":"exit","exitCode":1}"#),
        ]);
        adapter.on_mount().unwrap();
        match adapter.poll().unwrap() {
            futures::Async::Ready(ending) => assert_eq!(
                ending,
                crate::session::Ending::Exited { code: Some(1) }
            ),
            futures::Async::NotReady => panic!("adapter not ready"),
        }
        assert!(adapter
            .widget()
            .contents()
            .contains("Process Finished (exit code 1)."));

        let (transport, new) =
            mock::Transport::new(vec![TransportEvent::Opened]);
        adapter
            .restart(crate::session::Session::new(
                transport,
                crate::protocol::Framing::structured("/bin/bash"),
                crate::resize::Policy::Immediate,
            ))
            .unwrap();
        assert_eq!(adapter.widget().focused, 2);
        pending(&mut adapter);
        assert_eq!(adapter.session().state(), crate::session::State::Active);
        assert_eq!(
            new.sent(),
            vec![
                r#"{"command":"/bin/bash"}"#,
                r#"{"type":"resize","cols":80,"rows":24}"#,
            ]
        );
        assert!(old.is_closed());
    }

    #[test]
    fn test_click_focuses() {
        let (mut adapter, _handle) = adapter(vec![]);
        adapter.on_click().unwrap();
        adapter.on_click().unwrap();
        assert_eq!(adapter.widget().focused, 2);
    }

    #[test]
    fn test_close_without_overlay() {
        let (mut adapter, handle) = adapter(vec![TransportEvent::Opened]);
        pending(&mut adapter);
        adapter.close();
        assert!(handle.is_closed());
        assert_eq!(
            adapter.poll().unwrap(),
            futures::Async::Ready(crate::session::Ending::Closed {
                code: None
            })
        );
        assert!(adapter.widget().restart_shown.is_empty());
    }
}
