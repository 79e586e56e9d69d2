pub use futures::{Future as _, Sink as _, Stream as _};
pub use snafu::futures01::{FutureExt as _, StreamExt as _};
pub use snafu::{OptionExt as _, ResultExt as _};

pub use crate::error::{Error, Result};
