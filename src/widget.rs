use crate::prelude::*;
use tokio::io::AsyncWrite as _;

const RESTART_PROMPT: &str = "[r]estart or [q]uit";

// the view a session is rendered into
pub trait Widget {
    fn write(&mut self, data: &str) -> Result<()>;
    // the geometry the view currently has room for
    fn fit(&mut self) -> Result<crate::term::Size>;
    fn focus(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
    fn show_restart(
        &mut self,
        ending: &crate::session::Ending,
    ) -> Result<()>;
}

// the terminal we're running in. output is queued by the Widget methods and
// drained by poll_write_terminal/poll_flush_terminal from the owning task.
pub struct Local {
    stdout: tokio::io::Stdout,
    to_print: std::collections::VecDeque<u8>,
    needs_flush: bool,
    raw_screen: Option<crossterm::screen::RawScreen>,
}

impl Local {
    pub fn new() -> Self {
        Self {
            stdout: tokio::io::stdout(),
            to_print: std::collections::VecDeque::new(),
            needs_flush: false,
            raw_screen: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.to_print.is_empty() && !self.needs_flush
    }

    pub fn poll_write_terminal(
        &mut self,
    ) -> component_future::Poll<(), Error> {
        if self.to_print.is_empty() {
            return Ok(component_future::Async::NothingToDo);
        }

        let (a, b) = self.to_print.as_slices();
        let buf = if a.is_empty() { b } else { a };
        let n = component_future::try_ready!(self
            .stdout
            .poll_write(buf)
            .context(crate::error::WriteTerminal));
        self.to_print.drain(..n);
        self.needs_flush = true;
        Ok(component_future::Async::DidWork)
    }

    pub fn poll_flush_terminal(
        &mut self,
    ) -> component_future::Poll<(), Error> {
        if !self.needs_flush {
            return Ok(component_future::Async::NothingToDo);
        }

        component_future::try_ready!(self
            .stdout
            .poll_flush()
            .context(crate::error::FlushTerminal));
        self.needs_flush = false;
        Ok(component_future::Async::DidWork)
    }
}

impl Widget for Local {
    fn write(&mut self, data: &str) -> Result<()> {
        self.to_print.extend(data.as_bytes());
        Ok(())
    }

    fn fit(&mut self) -> Result<crate::term::Size> {
        crate::term::Size::get()
    }

    // keystrokes only reach us one at a time in raw mode
    fn focus(&mut self) -> Result<()> {
        if self.raw_screen.is_none() {
            self.raw_screen = Some(
                crossterm::screen::RawScreen::into_raw_mode()
                    .context(crate::error::ToRawMode)?,
            );
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        let title: String =
            title.chars().filter(|c| !c.is_control()).collect();
        self.write(&format!("\x1b]0;{}\x07", title))
    }

    fn show_restart(
        &mut self,
        _ending: &crate::session::Ending,
    ) -> Result<()> {
        self.write(&format!("\x1b[7m{}\x1b[m\r\n", RESTART_PROMPT))
    }
}
