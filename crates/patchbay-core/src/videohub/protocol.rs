// ── Videohub Ethernet protocol framing ──
//
// Text blocks: a `NAME:` header line, zero or more body lines, and a
// blank line terminator. Parsing here is pure; the server decides what
// to do with a command.

use std::str::FromStr;

use strum::{Display, EnumString};

pub const PROTOCOL_VERSION: &str = "2.3";

pub const ACK: &str = "ACK";
pub const NAK: &str = "NAK";

/// Blocks a panel may ask for by sending the bare header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum BlockName {
    #[strum(serialize = "OUTPUT LABELS")]
    OutputLabels,
    #[strum(serialize = "INPUT LABELS")]
    InputLabels,
    #[strum(serialize = "VIDEO OUTPUT ROUTING")]
    VideoOutputRouting,
    #[strum(serialize = "VIDEOHUB DEVICE")]
    VideohubDevice,
}

/// A complete block received from a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    /// Header-only request for one of the known blocks.
    Query(BlockName),
    /// `VIDEO OUTPUT ROUTING:` with `<output> <input>` body lines.
    Route(Vec<String>),
    /// Anything else; answered with `NAK`.
    Unknown(String),
}

/// Interpret the lines of one block. `None` for an empty block.
pub fn parse_block(lines: &[String]) -> Option<Command> {
    let (header, body) = lines.split_first()?;
    let header = header.trim();

    if header == "PING:" {
        return Some(Command::Ping);
    }

    // Panels differ on whether a query header keeps its colon.
    let name = header.strip_suffix(':').unwrap_or(header).trim_end();
    let block = BlockName::from_str(name).ok();
    if body.is_empty() {
        if let Some(block) = block {
            return Some(Command::Query(block));
        }
    }

    if block == Some(BlockName::VideoOutputRouting) {
        return Some(Command::Route(body.to_vec()));
    }

    Some(Command::Unknown(header.to_owned()))
}

/// Parse one `<output> <input>` routing line.
pub fn parse_route(line: &str) -> Option<(usize, usize)> {
    let mut parts = line.split_whitespace();
    let output = parts.next()?.parse().ok()?;
    let input = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((output, input))
}

/// Render a block: header, body lines, blank-line terminator.
pub fn render<S: AsRef<str>>(header: &str, lines: &[S]) -> String {
    let mut out = String::with_capacity(header.len() + 2 + lines.len() * 8);
    out.push_str(header);
    for line in lines {
        out.push('\n');
        out.push_str(line.as_ref());
    }
    out.push_str("\n\n");
    out
}

/// Render a named block with a `NAME:` header.
pub fn render_named<S: AsRef<str>>(name: BlockName, lines: &[S]) -> String {
    render(&format!("{name}:"), lines)
}

/// A bare status line such as `ACK`.
pub fn render_status(status: &str) -> String {
    render::<&str>(status, &[])
}

pub fn preamble() -> String {
    render(
        "PROTOCOL PREAMBLE:",
        &[format!("Version: {PROTOCOL_VERSION}")],
    )
}

pub fn device_info(model_name: &str, inputs: usize, outputs: usize) -> String {
    render_named(
        BlockName::VideohubDevice,
        &[
            "Device present: true".to_owned(),
            format!("Model name: {model_name}"),
            format!("Video inputs: {inputs}"),
            "Video processing units: 0".to_owned(),
            format!("Video outputs: {outputs}"),
            "Video monitoring outputs: 0".to_owned(),
            "Serial ports: 0".to_owned(),
        ],
    )
}
