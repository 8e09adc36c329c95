// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! mRemoteNG connection file generation.
//!
//! Turns a CSV inventory of hosts into a `confCons.xml` file that mRemoteNG
//! can load directly. The file is unencrypted and never carries passwords.
//! Connections are grouped into one container per folder; connections without
//! a folder sit at the root.
//!
//! Node ids are UUID v5 values derived from the node path, so regenerating a
//! file from the same inventory keeps ids stable.

use html_escape::encode_double_quoted_attribute as escape;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult, Write as FmtWrite},
    io::Read,
    path::Path,
    str::FromStr,
};
use tracing::{info, instrument};
use uuid::Uuid;

/// Version of the mRemoteNG connection file format written.
pub const CONF_VERSION: &str = "2.6";

/// Connection protocol supported by mRemoteNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rdp,
    Ssh2,
    Ssh1,
    Telnet,
    Http,
    Https,
    Vnc,
    Raw,
}

impl Protocol {
    /// Port used when inventory leaves it empty.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Rdp => 3389,
            Self::Ssh2 | Self::Ssh1 => 22,
            Self::Telnet => 23,
            Self::Http => 80,
            Self::Https => 443,
            Self::Vnc => 5900,
            Self::Raw => 0,
        }
    }
}

impl FromStr for Protocol {
    type Err = MremoteError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_ascii_lowercase().as_str() {
            "rdp" => Ok(Self::Rdp),
            "ssh" | "ssh2" => Ok(Self::Ssh2),
            "ssh1" => Ok(Self::Ssh1),
            "telnet" => Ok(Self::Telnet),
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "vnc" => Ok(Self::Vnc),
            "raw" => Ok(Self::Raw),
            _ => Err(MremoteError::UnknownProtocol(data.into())),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Rdp => "RDP",
            Self::Ssh2 => "SSH2",
            Self::Ssh1 => "SSH1",
            Self::Telnet => "Telnet",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Vnc => "VNC",
            Self::Raw => "RAW",
        };
        write!(fmt, "{name}")
    }
}

#[derive(Debug, Deserialize)]
struct InventoryRow {
    name: String,
    hostname: String,
    protocol: String,
    #[serde(default)]
    port: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    folder: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Single connection entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub hostname: String,
    pub protocol: Protocol,
    pub port: u16,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub folder: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<InventoryRow> for Connection {
    type Error = MremoteError;

    fn try_from(row: InventoryRow) -> Result<Self> {
        let protocol = row.protocol.parse::<Protocol>()?;
        let port = match non_empty(row.port) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|_| MremoteError::InvalidPort(port.clone()))?,
            None => protocol.default_port(),
        };

        Ok(Self {
            name: row.name,
            hostname: row.hostname,
            protocol,
            port,
            username: non_empty(row.username),
            domain: non_empty(row.domain),
            folder: non_empty(row.folder),
            description: non_empty(row.description),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Parse CSV inventory.
///
/// # Errors
///
/// - Return [`MremoteError::Csv`] if inventory is not valid CSV.
/// - Return [`MremoteError::Row`] if a row names an unknown protocol, or an
///   invalid port.
pub fn parse_inventory(reader: impl Read) -> Result<Vec<Connection>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut connections = Vec::new();
    for (index, row) in reader.deserialize::<InventoryRow>().enumerate() {
        let connection = Connection::try_from(row?).map_err(|err| MremoteError::Row {
            source: Box::new(err),
            line: index + 2,
        })?;
        connections.push(connection);
    }

    Ok(connections)
}

/// Load CSV inventory from file.
///
/// # Errors
///
/// - Return [`MremoteError::Read`] if file cannot be opened.
/// - Return any error of [`parse_inventory`].
#[instrument(skip(path), level = "debug")]
pub fn load_inventory(path: impl AsRef<Path>) -> Result<Vec<Connection>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|err| MremoteError::Read {
        source: err,
        path: path.display().to_string(),
    })?;
    let connections = parse_inventory(file)?;
    info!("loaded {} connection(s) from {:?}", connections.len(), path.display());

    Ok(connections)
}

/// Deterministic id of node at path.
///
/// Callers keep paths unique per node, see [`container_path`] and
/// [`connection_path`].
pub fn node_id(path: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("mybin/mremote/{path}").as_bytes())
}

/// Node path of folder container.
pub fn container_path(folder: &str) -> String {
    format!("container/{folder}")
}

/// Node path of connection at inventory position.
///
/// Position keeps duplicate names apart, e.g., same host listed once per protocol.
pub fn connection_path(folder: Option<&str>, position: usize, name: &str) -> String {
    format!("connection/{}/{position}/{name}", folder.unwrap_or_default())
}

/// Render connections as mRemoteNG connection file.
pub fn render_conf(connections: &[Connection]) -> String {
    let mut folders: BTreeMap<&str, Vec<(usize, &Connection)>> = BTreeMap::new();
    let mut loose = Vec::new();
    for (position, connection) in connections.iter().enumerate() {
        match connection.folder.as_deref() {
            Some(folder) => folders.entry(folder).or_default().push((position, connection)),
            None => loose.push((position, connection)),
        }
    }

    // INVARIANT: Writing into a string never fails.
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="utf-8"?>"#);
    let _ = writeln!(
        xml,
        r#"<mrng:Connections xmlns:mrng="http://mremoteng.org" Name="Connections" Export="false" EncryptionEngine="AES" BlockCipherMode="GCM" KdfIterations="1000" FullFileEncryption="false" ConfVersion="{CONF_VERSION}">"#
    );

    for (folder, members) in folders {
        let _ = writeln!(
            xml,
            r#"  <Node Name="{}" Type="Container" Expanded="true" Id="{}">"#,
            escape(folder),
            node_id(&container_path(folder))
        );
        for (position, connection) in members {
            let path = connection_path(Some(folder), position, &connection.name);
            render_connection(&mut xml, connection, &path, 4);
        }
        let _ = writeln!(xml, "  </Node>");
    }

    for (position, connection) in loose {
        let path = connection_path(None, position, &connection.name);
        render_connection(&mut xml, connection, &path, 2);
    }

    let _ = writeln!(xml, "</mrng:Connections>");
    xml
}

fn render_connection(xml: &mut String, connection: &Connection, path: &str, indent: usize) {
    let optional = |value: &Option<String>| escape(value.as_deref().unwrap_or_default()).into_owned();
    let _ = writeln!(
        xml,
        r#"{:indent$}<Node Name="{}" Type="Connection" Descr="{}" Id="{}" Username="{}" Domain="{}" Hostname="{}" Protocol="{}" Port="{}" />"#,
        "",
        escape(&connection.name),
        optional(&connection.description),
        node_id(path),
        optional(&connection.username),
        optional(&connection.domain),
        escape(&connection.hostname),
        connection.protocol,
        connection.port,
    );
}

/// Write connection file.
///
/// # Errors
///
/// - Return [`MremoteError::Write`] if file cannot be written.
#[instrument(skip(path, xml), level = "debug")]
pub fn write_conf(path: impl AsRef<Path>, xml: &str) -> Result<()> {
    let path = path.as_ref();
    let to_error = |err: std::io::Error| MremoteError::Write {
        source: err,
        path: path.display().to_string(),
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent).map_err(to_error)?;
    }
    std::fs::write(path, xml).map_err(to_error)?;
    info!("wrote {:?}", path.display());

    Ok(())
}

/// mRemoteNG generation error types.
#[derive(Debug, thiserror::Error)]
pub enum MremoteError {
    /// Inventory cannot be opened.
    #[error("failed to read inventory {path:?}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Connection file cannot be written.
    #[error("failed to write {path:?}")]
    Write {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Inventory is not valid CSV.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Inventory row is invalid.
    #[error("invalid inventory row on line {line}")]
    Row {
        #[source]
        source: Box<MremoteError>,
        line: usize,
    },

    /// Protocol is not supported.
    #[error("unknown protocol {0:?}")]
    UnknownProtocol(String),

    /// Port is not a number.
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Friendly result alias :3
pub type Result<T, E = MremoteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case("ssh", Protocol::Ssh2; "bare ssh means ssh2")]
    #[test_case("SSH1", Protocol::Ssh1; "upper case")]
    #[test_case(" Rdp ", Protocol::Rdp; "padded mixed case")]
    #[test_case("https", Protocol::Https; "https")]
    #[test]
    fn protocol_parses_case_insensitively(input: &str, expect: Protocol) -> anyhow::Result<()> {
        pretty_assertions::assert_eq!(input.parse::<Protocol>()?, expect);
        Ok(())
    }

    #[test]
    fn parse_inventory_fills_default_ports() -> anyhow::Result<()> {
        let inventory = indoc! {"
            name,hostname,protocol,port,username,domain,folder,description
            web,10.0.0.5,ssh,,admin,,Linux,front end
            dc,10.0.0.1,RDP,13389,,CORP,Windows,
            switch,10.0.0.2,telnet,,,,,
        "};

        let result = parse_inventory(inventory.as_bytes())?;
        pretty_assertions::assert_eq!(result.len(), 3);
        pretty_assertions::assert_eq!(result[0].protocol, Protocol::Ssh2);
        pretty_assertions::assert_eq!(result[0].port, 22);
        pretty_assertions::assert_eq!(result[0].username.as_deref(), Some("admin"));
        pretty_assertions::assert_eq!(result[0].domain, None);
        pretty_assertions::assert_eq!(result[1].port, 13389);
        pretty_assertions::assert_eq!(result[1].description, None);
        pretty_assertions::assert_eq!(result[2].port, 23);
        pretty_assertions::assert_eq!(result[2].folder, None);

        Ok(())
    }

    #[test]
    fn parse_inventory_reports_bad_row() {
        let inventory = indoc! {"
            name,hostname,protocol
            ok,10.0.0.5,vnc
            bad,10.0.0.6,gopher
        "};

        let result = parse_inventory(inventory.as_bytes());
        assert!(matches!(result, Err(MremoteError::Row { line: 3, .. })));
    }

    #[test]
    fn render_conf_groups_by_sorted_folder() -> anyhow::Result<()> {
        let inventory = indoc! {r#"
            name,hostname,protocol,folder,description
            zeta,10.0.0.9,ssh,Zone B,
            "a & b",10.0.0.1,rdp,Zone A,"<primary>"
            loose,10.0.0.7,vnc,,
        "#};
        let connections = parse_inventory(inventory.as_bytes())?;

        let xml = render_conf(&connections);
        let zone_a = xml.find(r#"Name="Zone A""#).unwrap();
        let zone_b = xml.find(r#"Name="Zone B""#).unwrap();
        assert!(zone_a < zone_b);
        assert!(xml.contains(r#"ConfVersion="2.6""#));
        assert!(xml.contains(r#"Name="a &amp; b""#));
        assert!(xml.contains(r#"Descr="&lt;primary&gt;""#));
        assert!(xml.contains(r#"Protocol="VNC" Port="5900""#));
        let zeta = connection_path(Some("Zone B"), 0, "zeta");
        assert!(xml.contains(&format!(r#"Id="{}""#, node_id(&zeta))));
        let loose = connection_path(None, 2, "loose");
        assert!(xml.contains(&format!(r#"Id="{}""#, node_id(&loose))));
        assert!(!xml.contains("Password"));
        pretty_assertions::assert_eq!(xml, render_conf(&connections));

        Ok(())
    }

    #[test]
    fn node_ids_are_stable_and_distinct() {
        pretty_assertions::assert_eq!(node_id("Linux/web"), node_id("Linux/web"));
        assert_ne!(node_id("Linux/web"), node_id("Linux"));
        pretty_assertions::assert_eq!(node_id("Linux").get_version_num(), 5);
    }

    fn rendered_ids(xml: &str) -> Vec<&str> {
        xml.split(r#"Id=""#)
            .skip(1)
            .filter_map(|rest| rest.split('"').next())
            .collect()
    }

    #[test_case(
        "name,hostname,protocol,folder\nweb,10.0.0.1,ssh,web\nweb,10.0.0.2,ssh,\n";
        "folder and loose connection share name"
    )]
    #[test_case(
        "name,hostname,protocol,folder\ndb,10.0.0.3,ssh,Prod\ndb,10.0.0.3,rdp,Prod\n";
        "same name twice in one folder"
    )]
    #[test]
    fn render_conf_never_repeats_node_ids(inventory: &str) -> anyhow::Result<()> {
        let connections = parse_inventory(inventory.as_bytes())?;
        let xml = render_conf(&connections);

        let ids = rendered_ids(&xml);
        pretty_assertions::assert_eq!(ids.len(), 3);
        let unique = ids.iter().collect::<std::collections::HashSet<_>>();
        pretty_assertions::assert_eq!(unique.len(), ids.len());

        Ok(())
    }

    #[test]
    fn write_conf_creates_parent_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("mremote/confCons.xml");
        write_conf(&path, "<xml/>")?;
        pretty_assertions::assert_eq!(std::fs::read_to_string(path)?, "<xml/>");

        Ok(())
    }
}
