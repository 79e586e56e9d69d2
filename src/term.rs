use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub rows: u16,
    pub cols: u16,
}

impl Size {
    pub fn new(cols: u16, rows: u16) -> Result<Self> {
        let size = Self { rows, cols };
        if !size.is_valid() {
            return Err(Error::InvalidGeometry { cols, rows });
        }
        Ok(size)
    }

    pub fn get() -> Result<Self> {
        let (cols, rows) = crossterm::terminal::size()
            .context(crate::error::GetTerminalSize)?;
        Self::new(cols, rows)
    }

    // a zero dimension means the widget isn't laid out yet
    pub fn is_valid(self) -> bool {
        self.rows > 0 && self.cols > 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&format!("{}x{}", self.cols, self.rows), f)
    }
}
