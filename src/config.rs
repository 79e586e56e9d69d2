use crate::prelude::*;
use serde::de::Deserialize as _;
use std::convert::TryFrom as _;

const CONFIG_FILENAME: &str = "config.toml";

const COMMAND_OPTION: &str = "command";
const ORIGIN_OPTION: &str = "origin";
const PATH_OPTION: &str = "path";
const RAW_OPTION: &str = "raw";
const RESIZE_DEBOUNCE_OPTION: &str = "resize-debounce-ms";

const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8000";
const DEFAULT_COMMAND: &str = "/bin/bash";
const DEFAULT_FRAMING: crate::protocol::FramingType =
    crate::protocol::FramingType::Structured;

pub trait Config: std::fmt::Debug {
    fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()>;
    fn run(
        &self,
    ) -> Box<dyn futures::Future<Item = (), Error = Error> + Send>;
}

pub fn config(
    filename: Option<&std::path::Path>,
) -> Result<Option<config::Config>> {
    let config_filename = if let Some(filename) = filename {
        if !filename.exists() {
            return Err(Error::ConfigFileDoesntExist {
                name: filename.to_string_lossy().to_string(),
            });
        }
        Some(filename.to_path_buf())
    } else {
        crate::dirs::Dirs::new().config_file(CONFIG_FILENAME, true)
    };
    config_filename
        .map(|config_filename| config_from_filename(&config_filename))
        .transpose()
}

fn config_from_filename(
    filename: &std::path::Path,
) -> Result<config::Config> {
    let mut config = config::Config::default();
    config
        .merge(config::File::from(filename))
        .context(crate::error::ParseConfigFile)?;
    Ok(config)
}

#[derive(serde::Deserialize, Debug)]
pub struct Server {
    #[serde(deserialize_with = "origin", default = "default_origin")]
    pub origin: url::Url,

    // defaults to the usual path for the session framing
    pub path: Option<String>,
}

impl Server {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let origin_help =
            "Address of the web console (defaults to http://127.0.0.1:8000)";
        let path_help = "Path of the terminal websocket on the console (defaults to /api/terminal/ws, or /ws/terminal with --raw)";
        app.arg(
            clap::Arg::with_name(ORIGIN_OPTION)
                .long(ORIGIN_OPTION)
                .takes_value(true)
                .value_name("URL")
                .help(origin_help),
        )
        .arg(
            clap::Arg::with_name(PATH_OPTION)
                .long(PATH_OPTION)
                .takes_value(true)
                .value_name("PATH")
                .help(path_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if matches.is_present(ORIGIN_OPTION) {
            self.origin =
                to_origin(matches.value_of(ORIGIN_OPTION).unwrap())?;
        }
        if matches.is_present(PATH_OPTION) {
            self.path =
                Some(matches.value_of(PATH_OPTION).unwrap().to_string());
        }
        Ok(())
    }

    pub fn endpoint(
        &self,
        framing: crate::protocol::FramingType,
    ) -> Result<url::Url> {
        let path = self
            .path
            .as_ref()
            .map_or_else(|| framing.default_path(), String::as_str);
        crate::transport::endpoint(&self.origin, path)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            path: None,
        }
    }
}

fn origin<'a, D>(deserializer: D) -> std::result::Result<url::Url, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    to_origin(&<String>::deserialize(deserializer)?)
        .map_err(serde::de::Error::custom)
}

fn default_origin() -> url::Url {
    to_origin(DEFAULT_ORIGIN).unwrap()
}

fn to_origin(origin: &str) -> Result<url::Url> {
    let url = url::Url::parse(origin)
        .context(crate::error::ParseUrl { input: origin })?;
    // catch a bad scheme here rather than at connect time
    crate::transport::endpoint(&url, "/")?;
    Ok(url)
}

#[derive(serde::Deserialize, Debug)]
pub struct Session {
    #[serde(deserialize_with = "framing", default = "default_framing")]
    pub framing: crate::protocol::FramingType,

    #[serde(default = "default_command")]
    pub command: String,

    #[serde(
        rename = "resize_debounce_ms",
        deserialize_with = "resize_policy",
        default
    )]
    pub resize_policy: crate::resize::Policy,
}

impl Session {
    pub fn cmd<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b> {
        let raw_help = "Exchange unframed text with the console instead of json messages (the console picks the program to run)";
        let command_help =
            "Program for the console to run (defaults to /bin/bash)";
        let resize_debounce_help = "Wait until the terminal size has been stable for MS milliseconds before reporting it (defaults to 0, report every change)";
        app.arg(
            clap::Arg::with_name(RAW_OPTION)
                .long(RAW_OPTION)
                .help(raw_help),
        )
        .arg(
            clap::Arg::with_name(COMMAND_OPTION)
                .long(COMMAND_OPTION)
                .takes_value(true)
                .value_name("CMD")
                .conflicts_with(RAW_OPTION)
                .help(command_help),
        )
        .arg(
            clap::Arg::with_name(RESIZE_DEBOUNCE_OPTION)
                .long(RESIZE_DEBOUNCE_OPTION)
                .takes_value(true)
                .value_name("MS")
                .help(resize_debounce_help),
        )
    }

    pub fn merge_args<'a>(
        &mut self,
        matches: &clap::ArgMatches<'a>,
    ) -> Result<()> {
        if matches.is_present(RAW_OPTION) {
            self.framing = crate::protocol::FramingType::Raw;
        }
        if matches.is_present(COMMAND_OPTION) {
            self.command =
                matches.value_of(COMMAND_OPTION).unwrap().to_string();
        }
        if matches.is_present(RESIZE_DEBOUNCE_OPTION) {
            let s = matches.value_of(RESIZE_DEBOUNCE_OPTION).unwrap();
            self.resize_policy = s
                .parse()
                .map(crate::resize::Policy::from_millis)
                .context(crate::error::ParseResizeDebounce { input: s })?;
        }
        Ok(())
    }

    pub fn framing(&self) -> crate::protocol::Framing {
        crate::protocol::Framing::new(self.framing, &self.command)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self {
            framing: default_framing(),
            command: default_command(),
            resize_policy: crate::resize::Policy::default(),
        }
    }
}

fn framing<'a, D>(
    deserializer: D,
) -> std::result::Result<crate::protocol::FramingType, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    crate::protocol::FramingType::try_from(
        <String>::deserialize(deserializer)?.as_ref(),
    )
    .map_err(serde::de::Error::custom)
}

fn default_framing() -> crate::protocol::FramingType {
    DEFAULT_FRAMING
}

fn default_command() -> String {
    DEFAULT_COMMAND.to_string()
}

fn resize_policy<'a, D>(
    deserializer: D,
) -> std::result::Result<crate::resize::Policy, D::Error>
where
    D: serde::de::Deserializer<'a>,
{
    Ok(crate::resize::Policy::from_millis(u64::deserialize(
        deserializer,
    )?))
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(toml: &str) -> T {
        let mut config = config::Config::default();
        config
            .merge(config::File::from_str(toml, config::FileFormat::Toml))
            .unwrap();
        config.try_into().unwrap()
    }

    fn matches<'a>(
        cmd: &dyn Fn(clap::App<'a, 'a>) -> clap::App<'a, 'a>,
        args: &[&str],
    ) -> clap::ArgMatches<'a> {
        cmd(clap::App::new("termbridge"))
            .get_matches_from_safe(
                std::iter::once("termbridge").chain(args.iter().copied()),
            )
            .unwrap()
    }

    #[test]
    fn test_server_defaults() {
        let server = Server::default();
        assert_eq!(server.origin.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(
            server
                .endpoint(crate::protocol::FramingType::Structured)
                .unwrap()
                .as_str(),
            "ws://127.0.0.1:8000/api/terminal/ws"
        );
        assert_eq!(
            server
                .endpoint(crate::protocol::FramingType::Raw)
                .unwrap()
                .as_str(),
            "ws://127.0.0.1:8000/ws/terminal"
        );
    }

    #[test]
    fn test_server_file() {
        let server: Server = parse(
            r#"
            origin = "https://console.example.com"
            path = "/custom/ws"
            "#,
        );
        assert_eq!(
            server
                .endpoint(crate::protocol::FramingType::Structured)
                .unwrap()
                .as_str(),
            "wss://console.example.com/custom/ws"
        );
    }

    #[test]
    fn test_server_rejects_bad_origin() {
        let mut config = config::Config::default();
        config
            .merge(config::File::from_str(
                r#"origin = "ftp://example.com""#,
                config::FileFormat::Toml,
            ))
            .unwrap();
        assert!(config.try_into::<Server>().is_err());
    }

    #[test]
    fn test_server_args() {
        let mut server = Server::default();
        server
            .merge_args(&matches(&Server::cmd, &["--origin", "https://a.b"]))
            .unwrap();
        assert_eq!(server.origin.as_str(), "https://a.b/");
        assert!(server.path.is_none());

        let mut server = Server::default();
        assert!(server
            .merge_args(&matches(&Server::cmd, &["--origin", "not a url"]))
            .is_err());
    }

    #[test]
    fn test_session_file() {
        let session: Session = parse(
            r#"
            framing = "raw"
            resize_debounce_ms = 150
            "#,
        );
        assert_eq!(session.framing, crate::protocol::FramingType::Raw);
        assert_eq!(session.command, DEFAULT_COMMAND);
        assert_eq!(
            session.resize_policy,
            crate::resize::Policy::Debounce(
                std::time::Duration::from_millis(150)
            )
        );
        assert_eq!(session.framing(), crate::protocol::Framing::Raw);

        let mut config = config::Config::default();
        config
            .merge(config::File::from_str(
                r#"framing = "binary""#,
                config::FileFormat::Toml,
            ))
            .unwrap();
        assert!(config.try_into::<Session>().is_err());
    }

    #[test]
    fn test_session_args() {
        let mut session = Session::default();
        session
            .merge_args(&matches(
                &Session::cmd,
                &["--command", "/usr/bin/htop", "--resize-debounce-ms", "0"],
            ))
            .unwrap();
        assert_eq!(
            session.framing(),
            crate::protocol::Framing::structured("/usr/bin/htop")
        );
        assert_eq!(session.resize_policy, crate::resize::Policy::Immediate);

        let mut session = Session::default();
        session.merge_args(&matches(&Session::cmd, &["--raw"])).unwrap();
        assert_eq!(session.framing, crate::protocol::FramingType::Raw);

        let mut session = Session::default();
        assert!(session
            .merge_args(&matches(
                &Session::cmd,
                &["--resize-debounce-ms", "soon"]
            ))
            .is_err());
    }
}
