use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Immediate,
    Debounce(std::time::Duration),
}

impl Policy {
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Self::Immediate
        } else {
            Self::Debounce(std::time::Duration::from_millis(ms))
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::Immediate
    }
}

// Tracks the last known geometry and decides when a geometry change should
// go out on the wire. With Policy::Immediate every notification is released
// right away (duplicates included); with Policy::Debounce a burst of
// notifications is collapsed into its last value once the burst has been
// quiet for the configured duration.
#[derive(Debug)]
pub struct Coordinator {
    policy: Policy,
    geometry: Option<crate::term::Size>,
    deadline: Option<std::time::Instant>,
}

impl Coordinator {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            geometry: None,
            deadline: None,
        }
    }

    pub fn notify(
        &mut self,
        size: crate::term::Size,
        now: std::time::Instant,
    ) -> Option<crate::term::Size> {
        if !size.is_valid() {
            log::debug!("ignoring invalid geometry {}", size);
            return None;
        }
        self.geometry = Some(size);
        match self.policy {
            Policy::Immediate => Some(size),
            Policy::Debounce(duration) => {
                self.deadline = Some(now + duration);
                None
            }
        }
    }

    pub fn poll_due(
        &mut self,
        now: std::time::Instant,
    ) -> Option<crate::term::Size> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.geometry
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<std::time::Instant> {
        self.deadline
    }

    pub fn geometry(&self) -> Option<crate::term::Size> {
        self.geometry
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

// one notification per SIGWINCH, the initial size is taken at mount
pub struct Resizer {
    winches:
        Box<dyn futures::stream::Stream<Item = (), Error = Error> + Send>,
}

impl Resizer {
    pub fn new() -> Self {
        let winches = tokio_signal::unix::Signal::new(
            tokio_signal::unix::libc::SIGWINCH,
        )
        .flatten_stream()
        .map(|_| ())
        .context(crate::error::SigWinchHandler);
        Self {
            winches: Box::new(winches),
        }
    }
}

#[must_use = "streams do nothing unless polled"]
impl futures::stream::Stream for Resizer {
    type Item = ();
    type Error = Error;

    fn poll(&mut self) -> futures::Poll<Option<Self::Item>, Self::Error> {
        self.winches.poll()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn size(cols: u16, rows: u16) -> crate::term::Size {
        crate::term::Size { rows, cols }
    }

    #[test]
    fn test_immediate() {
        let now = std::time::Instant::now();
        let mut coordinator = Coordinator::new(Policy::Immediate);
        assert_eq!(coordinator.geometry(), None);
        assert_eq!(coordinator.notify(size(80, 24), now), Some(size(80, 24)));
        // duplicates still go out
        assert_eq!(coordinator.notify(size(80, 24), now), Some(size(80, 24)));
        assert_eq!(
            coordinator.notify(size(120, 40), now),
            Some(size(120, 40))
        );
        assert_eq!(coordinator.geometry(), Some(size(120, 40)));
        assert_eq!(coordinator.deadline(), None);
        assert_eq!(coordinator.poll_due(now), None);
    }

    #[test]
    fn test_invalid_geometry() {
        let now = std::time::Instant::now();
        let mut coordinator = Coordinator::new(Policy::Immediate);
        assert_eq!(coordinator.notify(size(0, 24), now), None);
        assert_eq!(coordinator.notify(size(80, 0), now), None);
        assert_eq!(coordinator.geometry(), None);
        coordinator.notify(size(80, 24), now);
        assert_eq!(coordinator.notify(size(0, 0), now), None);
        assert_eq!(coordinator.geometry(), Some(size(80, 24)));
    }

    #[test]
    fn test_debounce() {
        let start = std::time::Instant::now();
        let delay = std::time::Duration::from_millis(100);
        let mut coordinator = Coordinator::new(Policy::Debounce(delay));

        assert_eq!(coordinator.notify(size(80, 24), start), None);
        let later = start + std::time::Duration::from_millis(50);
        assert_eq!(coordinator.notify(size(100, 30), later), None);
        assert_eq!(coordinator.deadline(), Some(later + delay));

        // the first deadline was pushed back by the second notification
        assert_eq!(coordinator.poll_due(start + delay), None);
        assert_eq!(coordinator.poll_due(later + delay), Some(size(100, 30)));
        assert_eq!(coordinator.deadline(), None);
        assert_eq!(coordinator.poll_due(later + delay * 2), None);
    }

    #[test]
    fn test_cancel() {
        let now = std::time::Instant::now();
        let delay = std::time::Duration::from_millis(10);
        let mut coordinator = Coordinator::new(Policy::Debounce(delay));
        coordinator.notify(size(80, 24), now);
        coordinator.cancel();
        assert_eq!(coordinator.poll_due(now + delay), None);
        assert_eq!(coordinator.geometry(), Some(size(80, 24)));
    }

    #[test]
    fn test_policy_from_millis() {
        assert_eq!(Policy::from_millis(0), Policy::Immediate);
        assert_eq!(
            Policy::from_millis(250),
            Policy::Debounce(std::time::Duration::from_millis(250))
        );
        assert_eq!(Policy::default(), Policy::Immediate);
    }
}
