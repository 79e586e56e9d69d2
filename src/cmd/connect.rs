use crate::prelude::*;
use tokio::io::AsyncRead as _;

#[derive(serde::Deserialize, Debug, Default)]
pub struct Config {
    #[serde(default)]
    server: crate::config::Server,

    #[serde(default)]
    session: crate::config::Session,
}

impl crate::config::Config for Config {
    fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        self.server.merge_args(matches)?;
        self.session.merge_args(matches)?;
        Ok(())
    }

    fn run(
        &self,
    ) -> Box<dyn futures::Future<Item = (), Error = Error> + Send> {
        let endpoint = match self.server.endpoint(self.session.framing) {
            Ok(endpoint) => endpoint,
            Err(e) => return Box::new(futures::future::err(e)),
        };
        Box::new(Console::new(
            endpoint,
            self.session.framing(),
            self.session.resize_policy,
        ))
    }
}

pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
    crate::config::Server::cmd(crate::config::Session::cmd(
        app.about("Open a remote shell in this terminal"),
    ))
}

pub fn config(
    config: Option<config::Config>,
) -> Result<Box<dyn crate::config::Config>> {
    let config: Config = if let Some(config) = config {
        config
            .try_into()
            .context(crate::error::CouldntParseConfig)?
    } else {
        Config::default()
    };
    Ok(Box::new(config))
}

enum Key {
    Restart,
    Quit,
}

impl Key {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'r' | b'R' => Some(Self::Restart),
            // ^C and ^D
            b'q' | b'Q' | 3 | 4 => Some(Self::Quit),
            _ => None,
        }
    }
}

// runs the local terminal as the view of one remote session at a time
struct Console {
    endpoint: url::Url,
    framing: crate::protocol::Framing,
    resize_policy: crate::resize::Policy,

    adapter: crate::adapter::Adapter<
        crate::widget::Local,
        crate::transport::Connection,
    >,
    mounted: bool,
    ended: bool,

    stdin: crate::async_stdin::Stdin,
    // trailing bytes of a utf8 sequence split across reads
    partial: Vec<u8>,
    resizer: crate::resize::Resizer,
    done: bool,
}

impl Console {
    fn new(
        endpoint: url::Url,
        framing: crate::protocol::Framing,
        resize_policy: crate::resize::Policy,
    ) -> Self {
        let session = Self::session(&endpoint, &framing, resize_policy);
        Self {
            endpoint,
            framing,
            resize_policy,

            adapter: crate::adapter::Adapter::new(
                crate::widget::Local::new(),
                session,
            ),
            mounted: false,
            ended: false,

            stdin: crate::async_stdin::Stdin::new(),
            partial: vec![],
            resizer: crate::resize::Resizer::new(),
            done: false,
        }
    }

    fn session(
        endpoint: &url::Url,
        framing: &crate::protocol::Framing,
        resize_policy: crate::resize::Policy,
    ) -> crate::session::Session<crate::transport::Connection> {
        crate::session::Session::new(
            crate::transport::Connection::connect(endpoint),
            framing.clone(),
            resize_policy,
        )
    }

    fn restart(&mut self) -> Result<()> {
        let session =
            Self::session(&self.endpoint, &self.framing, self.resize_policy);
        self.adapter.restart(session)?;
        self.ended = false;
        Ok(())
    }

    fn quit(&mut self) {
        self.adapter.close();
        self.done = true;
    }

    fn handle_keys(&mut self, buf: &[u8]) -> Result<()> {
        for &byte in buf {
            match Key::from_byte(byte) {
                Some(Key::Restart) => return self.restart(),
                Some(Key::Quit) => {
                    self.quit();
                    return Ok(());
                }
                None => {}
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, buf: &[u8]) {
        let data = take_utf8(&mut self.partial, buf);
        if !data.is_empty() {
            self.adapter.on_widget_input(&data);
        }
    }
}

// appends buf to partial and returns everything up to the last complete
// character, leaving a split multibyte sequence behind for the next read
fn take_utf8(partial: &mut Vec<u8>, buf: &[u8]) -> String {
    partial.extend_from_slice(buf);
    let valid = match std::str::from_utf8(partial) {
        Ok(s) => s.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        // not utf8 at all, pass it along as best we can
        Err(_) => partial.len(),
    };
    let rest = partial.split_off(valid);
    let data = String::from_utf8_lossy(partial).into_owned();
    *partial = rest;
    data
}

impl Console {
    const POLL_FNS:
        &'static [&'static dyn for<'a> Fn(
            &'a mut Self,
        )
            -> component_future::Poll<
            (),
            Error,
        >] = &[
        &Self::poll_mount,
        &Self::poll_adapter,
        &Self::poll_input,
        &Self::poll_resize,
        &Self::poll_write_terminal,
        &Self::poll_flush_terminal,
        &Self::poll_done,
    ];

    fn poll_mount(&mut self) -> component_future::Poll<(), Error> {
        if self.mounted {
            return Ok(component_future::Async::NothingToDo);
        }
        self.adapter.on_mount()?;
        self.mounted = true;
        Ok(component_future::Async::DidWork)
    }

    fn poll_adapter(&mut self) -> component_future::Poll<(), Error> {
        if self.ended || self.done {
            return Ok(component_future::Async::NothingToDo);
        }
        let ending = component_future::try_ready!(self.adapter.poll());
        log::info!(
            "session {} ended: {:?}",
            self.adapter.session().id(),
            ending
        );
        self.ended = true;
        Ok(component_future::Async::DidWork)
    }

    fn poll_input(&mut self) -> component_future::Poll<(), Error> {
        if self.done {
            return Ok(component_future::Async::NothingToDo);
        }
        let mut buf = [0u8; 4096];
        let n = component_future::try_ready!(self
            .stdin
            .poll_read(&mut buf)
            .context(crate::error::ReadTerminal));
        if n == 0 {
            log::info!("stdin closed");
            self.quit();
        } else if self.ended {
            self.handle_keys(&buf[..n])?;
        } else {
            self.handle_input(&buf[..n]);
        }
        Ok(component_future::Async::DidWork)
    }

    fn poll_resize(&mut self) -> component_future::Poll<(), Error> {
        if self.done {
            return Ok(component_future::Async::NothingToDo);
        }
        match component_future::try_ready!(self.resizer.poll()) {
            Some(()) => {
                self.adapter.on_resize()?;
                Ok(component_future::Async::DidWork)
            }
            None => unreachable!(),
        }
    }

    fn poll_write_terminal(&mut self) -> component_future::Poll<(), Error> {
        self.adapter.widget_mut().poll_write_terminal()
    }

    fn poll_flush_terminal(&mut self) -> component_future::Poll<(), Error> {
        self.adapter.widget_mut().poll_flush_terminal()
    }

    fn poll_done(&mut self) -> component_future::Poll<(), Error> {
        // everything we queued for the terminal goes out before we exit
        if self.done && self.adapter.widget().is_idle() {
            return Ok(component_future::Async::Ready(()));
        }
        Ok(component_future::Async::NothingToDo)
    }
}

#[must_use = "futures do nothing unless polled"]
impl futures::Future for Console {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Self::Item, Self::Error> {
        component_future::poll_future(self, Self::POLL_FNS)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_keys() {
        assert!(match Key::from_byte(b'r') {
            Some(Key::Restart) => true,
            _ => false,
        });
        for &byte in &[b'q', 3, 4] {
            assert!(match Key::from_byte(byte) {
                Some(Key::Quit) => true,
                _ => false,
            });
        }
        assert!(Key::from_byte(b'x').is_none());
        assert!(Key::from_byte(b'\r').is_none());
    }

    #[test]
    fn test_split_utf8_input() {
        let mut partial = vec![];
        let snowman = "\u{2603}".as_bytes();
        assert_eq!(take_utf8(&mut partial, b"ls"), "ls");
        assert!(partial.is_empty());

        assert_eq!(take_utf8(&mut partial, &[b'a', snowman[0]]), "a");
        assert_eq!(partial, vec![snowman[0]]);
        assert_eq!(take_utf8(&mut partial, &snowman[1..2]), "");
        assert_eq!(take_utf8(&mut partial, &snowman[2..]), "\u{2603}");
        assert!(partial.is_empty());
    }

    #[test]
    fn test_invalid_utf8_input() {
        let mut partial = vec![];
        assert_eq!(take_utf8(&mut partial, b"x\xffy"), "x\u{fffd}y");
        assert!(partial.is_empty());
    }

    #[test]
    fn test_config_sections() {
        let mut config = config::Config::default();
        config
            .merge(config::File::from_str(
                r#"
                [server]
                origin = "https://console.example.com"

                [session]
                framing = "raw"
                "#,
                config::FileFormat::Toml,
            ))
            .unwrap();
        let config: Config = config.try_into().unwrap();
        assert_eq!(
            config
                .server
                .endpoint(config.session.framing)
                .unwrap()
                .as_str(),
            "wss://console.example.com/ws/terminal"
        );
        assert_eq!(config.session.framing(), crate::protocol::Framing::Raw);
    }
}
