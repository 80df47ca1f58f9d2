use std::fmt::Display;

use colored::{ColoredString, Colorize};
use log::Level;

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub fn init_logger() {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{} {} {} {message}",
                now.format("%H:%M:%S%.3f").to_string().dimmed(),
                level_label(record.level()),
                target,
            ))
        })
        .filter(|meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = ALLOWED_LEVELS.contains(&meta.level());
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

enum Target {
    External(String),
    Server,
    Club,
    Core,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let mut split = str.split("::");
        let module = split.next().unwrap();

        match module {
            "baize_core" => Self::Core,
            "baize_server" => Self::Server,
            "baize_club" => Self::Club,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Target::External(x) => return write!(f, "[{x}]"),
            Target::Server => "server".bright_cyan(),
            Target::Club => "club".bright_magenta(),
            Target::Core => "core".bright_blue(),
        };

        write!(f, "[{label}]")
    }
}

fn level_label(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".bright_red().bold(),
        Level::Warn => "warn ".yellow().bold(),
        Level::Info => "info ".green(),
        Level::Debug => "debug".white(),
        Level::Trace => "trace".normal(),
    }
}
