// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Logging setup of the command line tool.
use env_logger::fmt::{Color, Formatter};
use std::io::Write as _;

/// Prefix shared by the targets of all registry crates.
const CRATE_PREFIX: &str = "mrv_registry_";

/// Initializes [env_logger] with our formatter. Logs go to stderr so that they do not mix with
/// command output.
///
/// `RUST_LOG` overrides `verbosity`. Without either only warnings and errors are shown.
pub fn init(verbosity: u8) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter(verbosity)))
        .format(format_record)
        .target(env_logger::Target::Stderr)
        .init();
}

fn filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,mrv_registry_client=info,mrv_registry_cli=info",
        _ => "info,mrv_registry_client=debug,mrv_registry_cli=debug",
    }
}

/// `client::sequence` for `mrv_registry_client::sequence`. Other targets are kept.
fn short_target(target: &str) -> &str {
    target.strip_prefix(CRATE_PREFIX).unwrap_or(target)
}

fn format_record(formatter: &mut Formatter, record: &log::Record) -> std::io::Result<()> {
    let time = time::OffsetDateTime::now_local();
    let mut dimmed = formatter.style();
    // Intense black renders as grey
    dimmed.set_color(Color::Black).set_intense(true);
    writeln!(
        formatter,
        "{time} {level:<5} {target}  {msg}",
        time = dimmed.value(format!(
            "{}.{:03}",
            time.format("%H:%M:%S"),
            time.millisecond()
        )),
        level = formatter.default_styled_level(record.level()),
        target = dimmed.value(short_target(record.target())),
        msg = record.args()
    )
}
