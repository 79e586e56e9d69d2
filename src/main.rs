mod adapter;
mod async_stdin;
mod cmd;
mod config;
mod dirs;
mod error;
mod prelude;
mod protocol;
mod resize;
mod session;
mod term;
mod transport;
mod widget;

fn main() {
    match crate::cmd::parse().and_then(|m| crate::cmd::run(&m)) {
        Ok(_) => {}
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        }
    }
}
