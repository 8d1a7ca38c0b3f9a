use crate::error::CoreError;
use std::fmt;
use std::str::FromStr;

/// The receiver-emitted connection string the sender's sole input for
/// reaching it (spec §6 "Connection URL", GLOSSARY "Connection URL"):
/// `wdt://<host>?ports=p1,p2,...&id=<transfer_id>&num_ports=<n>&protocol_version=<v>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUrl {
    /// Hostname or address the receiver bound its ports on.
    pub host: String,
    /// Ports actually bound, in ascending order.
    pub ports: Vec<u16>,
    /// Transfer identifier, generated if the caller didn't supply one.
    pub transfer_id: String,
    /// Protocol version the receiver negotiated at the time the URL was
    /// emitted.
    pub protocol_version: u16,
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ports = self
            .ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "wdt://{}?ports={}&id={}&num_ports={}&protocol_version={}",
            self.host,
            ports,
            self.transfer_id,
            self.ports.len(),
            self.protocol_version
        )
    }
}

impl FromStr for ConnectionUrl {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidConnectionUrl(s.to_string());

        let rest = s.strip_prefix("wdt://").ok_or_else(invalid)?;
        let (host, query) = rest.split_once('?').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }

        let mut ports: Option<Vec<u16>> = None;
        let mut transfer_id: Option<String> = None;
        let mut protocol_version: Option<u16> = None;

        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').ok_or_else(invalid)?;
            match key {
                "ports" => {
                    let parsed = value
                        .split(',')
                        .map(|p| p.parse::<u16>().map_err(|_| invalid()))
                        .collect::<Result<Vec<u16>, _>>()?;
                    ports = Some(parsed);
                }
                "id" => transfer_id = Some(value.to_string()),
                "protocol_version" => {
                    protocol_version = Some(value.parse::<u16>().map_err(|_| invalid())?);
                }
                // num_ports and any other query param is derivable or
                // forward-compatible extra data; ignored on parse.
                _ => {}
            }
        }

        Ok(Self {
            host: host.to_string(),
            ports: ports.ok_or_else(invalid)?,
            transfer_id: transfer_id.ok_or_else(invalid)?,
            protocol_version: protocol_version.ok_or_else(invalid)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let url = ConnectionUrl {
            host: "10.0.0.5".into(),
            ports: vec![22011, 22012, 22013],
            transfer_id: "xfer-42".into(),
            protocol_version: 1,
        };
        let rendered = url.to_string();
        let parsed: ConnectionUrl = rendered.parse().unwrap();
        assert_eq!(parsed, url);
    }

    #[test]
    fn missing_scheme_is_rejected() {
        assert!("http://host?ports=1".parse::<ConnectionUrl>().is_err());
    }

    #[test]
    fn missing_required_query_param_is_rejected() {
        assert!("wdt://host?ports=1,2".parse::<ConnectionUrl>().is_err());
    }

    #[test]
    fn unknown_query_params_are_ignored() {
        let parsed: ConnectionUrl = "wdt://host?ports=1&id=x&protocol_version=1&extra=ignored"
            .parse()
            .unwrap();
        assert_eq!(parsed.host, "host");
    }
}
